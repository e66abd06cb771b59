//! Round state machine.
//!
//! `RoundEngine` is Sans-IO: it reads time and randomness from an
//! [`Environment`], mutates balances through a [`PlayerBook`], and returns
//! the messages to deliver as [`EngineAction`]s. Ticks and player commands
//! must be fed from a single owner; the engine assumes exclusive access.
//!
//! # Phases
//!
//! ```text
//! Ready ──ready_duration──▶ Bet ──bet_duration──▶ CashOut ──crash / risk cap──▶ Settle
//!   ▲                                                                              │
//!   └──────────────────────────────settle_duration─────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - Balances only move through [`Player::debit`] (refuses overdraw) and
//!   [`Player::credit`].
//! - The multiplier never decreases within a round.
//! - Before the multiplier is raised, the house-risk test must pass for the
//!   new value; otherwise the round settles at the current one.
//! - Round ids strictly increase.

use std::time::Duration;

use crashline_proto::Message;
use tracing::{debug, info, warn};

use crate::{
    Bet, BetRequest, CashOutEvent, EngineConfig, Environment, GameCommand, Money, Phase, Player, PlayerBook,
    PlayerId, RejectReason, Round, Slot, bots,
    history::{History, RoundSummary},
    outbound::{self, InitView},
};

/// Message the engine wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Deliver to every real online player
    Broadcast(Message),
    /// Deliver to one player; never addressed to a bot
    Unicast {
        /// Recipient
        player: PlayerId,
        /// Message
        message: Message,
    },
}

/// Drives rounds and applies player commands.
pub struct RoundEngine<E: Environment> {
    config: EngineConfig,
    phase: Phase,
    phase_started: E::Instant,
    round: Round,
    previous: Option<RoundSummary>,
    history: History,
    bot_schedule: Vec<Duration>,
    bot_seq: u64,
    bets_dirty: bool,
    cash_outs_dirty: bool,
}

impl<E: Environment> RoundEngine<E> {
    /// Engine in `Ready`, before the first round.
    pub fn new(config: EngineConfig, env: &E) -> Self {
        let history = History::new(config.leaderboard_size, config.history_size);
        Self {
            phase: Phase::Ready,
            phase_started: env.now(),
            round: Round::new(0, 1.0, env.wall_clock_millis()),
            previous: None,
            history,
            bot_schedule: Vec::new(),
            bot_seq: 0,
            bets_dirty: false,
            cash_outs_dirty: false,
            config,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current round, or the last settled one while in `Ready`.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Last settled round.
    pub fn previous(&self) -> Option<&RoundSummary> {
        self.previous.as_ref()
    }

    /// Leaderboards and recent rounds.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the phase clock.
    ///
    /// Handles every transition that is due, so a late tick catches up
    /// instead of stretching a phase. Phase start times are anchored to when
    /// the previous phase should have ended.
    pub fn tick(&mut self, env: &E, book: &mut impl PlayerBook) -> Vec<EngineAction> {
        let now = env.now();
        let mut actions = Vec::new();

        loop {
            let before = self.phase;
            let elapsed = now - self.phase_started;
            match self.phase {
                Phase::Ready => {
                    if elapsed >= self.config.ready_duration {
                        let start = self.phase_started + self.config.ready_duration;
                        self.enter_bet(env, book, start, now, &mut actions);
                    }
                },
                Phase::Bet => {
                    self.spawn_due_bots(env, book, elapsed);
                    if elapsed >= self.config.bet_duration {
                        let start = self.phase_started + self.config.bet_duration;
                        self.enter_cash_out(env, start, now, &mut actions);
                    }
                },
                // the multiplier first moves on the tick after betting closes
                Phase::CashOut if now > self.phase_started => self.fly(env, book, now, &mut actions),
                Phase::CashOut => {},
                Phase::Settle => {
                    if elapsed >= self.config.settle_duration {
                        let start = self.phase_started + self.config.settle_duration;
                        self.enter_ready(env, book, start, now, &mut actions);
                    }
                },
            }
            if self.phase == before {
                break;
            }
        }

        self.flush(&mut actions);
        actions
    }

    /// Apply a gameplay command from `player` and return the responses.
    ///
    /// Rejections are answered under the command's response name with the
    /// reason's code; state is left exactly as it was.
    pub fn handle_command(
        &mut self,
        book: &mut impl PlayerBook,
        player: PlayerId,
        command: GameCommand,
        request_id: Option<i64>,
    ) -> Vec<EngineAction> {
        let to_player = |message: Message| EngineAction::Unicast { player, message };
        let response = command.response_name();

        let result = match command {
            GameCommand::Bet(request) => self
                .place_bet(book, player, &request)
                .map(|(bet, balance)| {
                    vec![to_player(outbound::bet_placed(&bet, request_id)), to_player(outbound::new_balance(balance))]
                })
                .map_err(|reason| (reason, Some(request.slot))),
            GameCommand::CancelBet { slot } => self
                .cancel_bet(book, player, slot)
                .map(|(bet, balance)| {
                    vec![to_player(outbound::bet_cancelled(&bet, request_id)), to_player(outbound::new_balance(balance))]
                })
                .map_err(|reason| (reason, Some(slot))),
            GameCommand::CashOut { slot } => {
                let mut actions = Vec::new();
                Slot::from_wire(slot)
                    .and_then(|parsed| self.cash_out(book, player, parsed, request_id, &mut actions))
                    .map(|_| actions)
                    .map_err(|reason| (reason, Some(slot)))
            },
            GameCommand::CurrentBetsInfo => Ok(vec![to_player(outbound::current_bets_info(&self.round, request_id))]),
            GameCommand::PreviousRoundInfo => {
                Ok(vec![to_player(outbound::previous_round_info(self.previous.as_ref(), request_id))])
            },
            GameCommand::HugeWinsInfo => {
                Ok(vec![to_player(outbound::wins(response, self.history.huge_wins(), request_id))])
            },
            GameCommand::TopWinsInfo => Ok(vec![to_player(outbound::wins(response, self.history.top_wins(), request_id))]),
            GameCommand::TopRoundsInfo => {
                Ok(vec![to_player(outbound::top_rounds(self.history.top_rounds(), request_id))])
            },
        };

        result.unwrap_or_else(|(reason, slot)| {
            debug!(player = %player, command = response, %reason, "command rejected");
            vec![to_player(outbound::rejected(response, &reason, slot, request_id))]
        })
    }

    /// Forfeit every open bet of a departing player. Stakes stay with the
    /// house.
    pub fn abandon(&mut self, player: PlayerId) {
        if matches!(self.phase, Phase::Bet | Phase::CashOut) {
            let count = self.round.abandon(player);
            if count > 0 {
                debug!(player = %player, count, "open bets abandoned");
                self.bets_dirty = true;
            }
        }
    }

    /// Lobby description for a freshly logged-in player.
    pub fn init_message(&self, book: &impl PlayerBook, player: &Player, ping_interval_ms: i32) -> Message {
        let active_bets = if matches!(self.phase, Phase::Bet | Phase::CashOut) {
            self.round.bets().iter().filter(|b| b.player == player.id && !b.abandoned).collect()
        } else {
            Vec::new()
        };
        let view = InitView {
            rounds: self.history.recent().collect(),
            active_bets,
            online_players: self.display_online(book),
            round_id: self.round.id,
            phase: self.phase,
            multiplier: self.round.multiplier,
        };
        outbound::init(&view, player, &self.config, ping_interval_ms)
    }

    fn display_online(&self, book: &impl PlayerBook) -> u64 {
        book.online_count() as u64 + self.config.bots.display_addend
    }

    fn place_bet(
        &mut self,
        book: &mut impl PlayerBook,
        player: PlayerId,
        request: &BetRequest,
    ) -> Result<(Bet, Money), RejectReason> {
        self.require_phase(Phase::Bet)?;

        let stake = Money::from_f64(request.stake).filter(|s| !s.is_zero()).ok_or(RejectReason::InvalidStake)?;
        let slot = Slot::from_wire(request.slot)?;
        if self.round.bet(player, slot).is_some() {
            return Err(RejectReason::SlotOccupied(slot.index()));
        }
        if stake < self.config.min_bet || stake > self.config.max_bet {
            return Err(RejectReason::StakeOutOfRange { stake, min: self.config.min_bet, max: self.config.max_bet });
        }
        if let Some(threshold) = request.auto_cash_out {
            if !(self.config.auto_cash_out_min..=self.config.auto_cash_out_max).contains(&threshold) {
                return Err(RejectReason::InvalidAutoCashOut(threshold));
            }
        }

        let owner = book.player_mut(player).ok_or(RejectReason::UnknownPlayer)?;
        let balance = owner.debit(stake)?;

        let bet = self.round.place(Bet {
            player,
            username: owner.username.clone(),
            currency: owner.currency.clone(),
            slot,
            stake,
            auto_cash_out: request.auto_cash_out,
            round_bet_id: 0,
            cash_out: None,
            abandoned: false,
        });
        self.bets_dirty = true;
        Ok((bet.clone(), balance))
    }

    fn cancel_bet(&mut self, book: &mut impl PlayerBook, player: PlayerId, slot: i64) -> Result<(Bet, Money), RejectReason> {
        self.require_phase(Phase::Bet)?;
        let slot = Slot::from_wire(slot)?;
        if self.round.bet(player, slot).is_none() {
            return Err(RejectReason::NoBet(slot.index()));
        }
        let owner = book.player_mut(player).ok_or(RejectReason::UnknownPlayer)?;
        let bet = self.round.withdraw(player, slot).ok_or(RejectReason::NoBet(slot.index()))?;
        let balance = owner.credit(bet.stake);
        self.bets_dirty = true;
        Ok((bet, balance))
    }

    fn cash_out(
        &mut self,
        book: &mut impl PlayerBook,
        player: PlayerId,
        slot: Slot,
        request_id: Option<i64>,
        actions: &mut Vec<EngineAction>,
    ) -> Result<CashOutEvent, RejectReason> {
        self.require_phase(Phase::CashOut)?;
        let at = self.round.multiplier;
        self.settle_cash_out(book, player, slot, at, request_id, actions)
    }

    /// Credit a cash-out at `multiplier` and queue its notifications.
    fn settle_cash_out(
        &mut self,
        book: &mut impl PlayerBook,
        player: PlayerId,
        slot: Slot,
        multiplier: f64,
        request_id: Option<i64>,
        actions: &mut Vec<EngineAction>,
    ) -> Result<CashOutEvent, RejectReason> {
        let owner = book.player_mut(player).ok_or(RejectReason::UnknownPlayer)?;
        let event = self.round.cash_out(player, slot, multiplier, self.config.max_user_win)?;
        let balance = owner.credit(event.payout);
        self.cash_outs_dirty = true;

        if !player.is_bot() {
            actions.push(EngineAction::Unicast { player, message: outbound::cashed_out(&event, request_id) });
            actions.push(EngineAction::Unicast { player, message: outbound::new_balance(balance) });
        }
        Ok(event)
    }

    fn require_phase(&self, required: Phase) -> Result<(), RejectReason> {
        if self.phase == required { Ok(()) } else { Err(RejectReason::WrongPhase { required, actual: self.phase }) }
    }

    fn state_message(&self, env: &E, now: E::Instant) -> Message {
        let server_ms = env.wall_clock_millis();
        let length = match self.phase {
            Phase::Ready => self.config.ready_duration,
            Phase::Bet => self.config.bet_duration,
            Phase::CashOut => Duration::ZERO,
            Phase::Settle => self.config.settle_duration,
        };
        let left = length.saturating_sub(now - self.phase_started);
        let left_ms = i64::try_from(left.as_millis()).unwrap_or(i64::MAX);
        let bet_end_ms = if self.phase == Phase::Bet { server_ms + left_ms } else { 0 };
        outbound::change_state(self.phase, self.round.id, bet_end_ms, server_ms, left_ms)
    }

    fn enter_bet(
        &mut self,
        env: &E,
        book: &impl PlayerBook,
        start: E::Instant,
        now: E::Instant,
        actions: &mut Vec<EngineAction>,
    ) {
        let id = self.round.id + 1;
        let crash_point = self.config.crash.draw(env.random_unit());

        self.phase = Phase::Bet;
        self.phase_started = start;
        self.round = Round::new(id, crash_point, env.wall_clock_millis());
        self.bot_schedule = bots::schedule(env, &self.config);
        self.bets_dirty = true;
        self.cash_outs_dirty = false;

        info!(round = id, bots = self.bot_schedule.len(), "betting open");
        debug!(round = id, crash_point, "crash point drawn");

        actions.push(EngineAction::Broadcast(self.state_message(env, now)));
        actions.push(EngineAction::Broadcast(outbound::online_players(self.display_online(book))));
    }

    fn enter_cash_out(&mut self, env: &E, start: E::Instant, now: E::Instant, actions: &mut Vec<EngineAction>) {
        self.phase = Phase::CashOut;
        self.phase_started = start;
        self.round.multiplier = 1.0;

        info!(
            round = self.round.id,
            bets = self.round.bets().len(),
            stake = %self.round.total_stake(),
            "betting closed"
        );
        actions.push(EngineAction::Broadcast(self.state_message(env, now)));
    }

    fn enter_settle(&mut self, env: &E, now: E::Instant, actions: &mut Vec<EngineAction>) {
        self.phase = Phase::Settle;
        self.phase_started = now;
        self.round.ended_at_ms = Some(env.wall_clock_millis());

        let multiplier = self.round.multiplier;
        info!(
            round = self.round.id,
            multiplier,
            stake = %self.round.total_stake(),
            paid = %self.round.total_paid(),
            "round settled"
        );

        // flush pending lists so clients see them before the crash
        self.flush(actions);
        actions.push(EngineAction::Broadcast(outbound::crash(multiplier)));
        actions.push(EngineAction::Broadcast(outbound::round_chart(self.round.id, multiplier)));
        actions.push(EngineAction::Broadcast(self.state_message(env, now)));

        let summary = RoundSummary::from_round(&self.round);
        self.history.record(&summary);
        self.previous = Some(summary);
    }

    fn enter_ready(
        &mut self,
        env: &E,
        book: &mut impl PlayerBook,
        start: E::Instant,
        now: E::Instant,
        actions: &mut Vec<EngineAction>,
    ) {
        self.phase = Phase::Ready;
        self.phase_started = start;
        self.bot_schedule.clear();

        let retired = book.retire_bots();
        debug!(round = self.round.id, retired, "bots retired");
        actions.push(EngineAction::Broadcast(self.state_message(env, now)));
    }

    /// One CashOut tick: risk check, raise, auto cash-outs, crash check.
    fn fly(&mut self, env: &E, book: &mut impl PlayerBook, now: E::Instant, actions: &mut Vec<EngineAction>) {
        let elapsed = now - self.phase_started;
        let target = self.config.curve.at(elapsed).min(self.round.crash_point);

        if target > self.round.multiplier {
            if !self.round.covers(target) {
                warn!(
                    round = self.round.id,
                    multiplier = self.round.multiplier,
                    refused = target,
                    "house risk limit reached, settling early"
                );
                self.enter_settle(env, now, actions);
                return;
            }
            self.round.multiplier = target;
            actions.push(EngineAction::Broadcast(outbound::multiplier(target)));
            self.auto_cash_outs(book, actions);
        }

        if self.round.multiplier >= self.round.crash_point || elapsed >= self.config.max_flight_duration {
            self.enter_settle(env, now, actions);
        }
    }

    /// Cash out every open bet whose threshold has been reached, or whose
    /// payout hit the max-win cap.
    ///
    /// A threshold pays at the threshold itself, which the multiplier passed
    /// at or before this tick.
    fn auto_cash_outs(&mut self, book: &mut impl PlayerBook, actions: &mut Vec<EngineAction>) {
        let current = self.round.multiplier;
        let cap = self.config.max_user_win;

        let due: Vec<(PlayerId, Slot, f64)> = self
            .round
            .bets()
            .iter()
            .filter(|b| b.is_open())
            .filter_map(|b| match b.auto_cash_out {
                Some(threshold) if threshold <= current => Some((b.player, b.slot, threshold)),
                _ if b.stake.scale(current) >= cap => Some((b.player, b.slot, current)),
                _ => None,
            })
            .collect();

        for (player, slot, at) in due {
            if let Err(reason) = self.settle_cash_out(book, player, slot, at, None, actions) {
                debug!(player = %player, %reason, "auto cash-out skipped");
            }
        }
    }

    fn spawn_due_bots(&mut self, env: &E, book: &mut impl PlayerBook, elapsed: Duration) {
        let due = self.bot_schedule.partition_point(|offset| *offset <= elapsed);
        self.bot_schedule.drain(..due);
        for _ in 0..due {
            self.bot_seq += 1;
            let Some((bot, request)) = bots::spawn(env, &self.config, self.bot_seq) else { continue };
            let id = bot.id;
            book.admit_bot(bot);
            if let Err(reason) = self.place_bet(book, id, &request) {
                debug!(bot = %id, %reason, "bot bet refused");
            }
        }
    }

    fn flush(&mut self, actions: &mut Vec<EngineAction>) {
        if self.bets_dirty {
            actions.push(EngineAction::Broadcast(outbound::current_bets(&self.round)));
            self.bets_dirty = false;
        }
        if self.cash_outs_dirty {
            actions.push(EngineAction::Broadcast(outbound::current_cash_outs(&self.round)));
            self.cash_outs_dirty = false;
        }
    }
}
