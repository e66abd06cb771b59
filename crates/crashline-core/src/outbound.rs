//! Builders for every message the engine sends.
//!
//! Field names and declared widths are part of the client contract: amounts
//! and multipliers are doubles, codes and slots ints, round ids longs, and
//! player ids strings.

use crashline_proto::{Message, WireObject, WireValue};

use crate::{
    Bet, CashOutEvent, EngineConfig, Money, Phase, Player, RejectReason, Round,
    history::{RoundRecord, RoundSummary, WinRecord},
};

/// Success code.
pub const CODE_OK: i32 = 200;

fn ok() -> WireObject {
    WireObject::new().with("code", CODE_OK)
}

fn list(items: impl IntoIterator<Item = WireObject>) -> WireValue {
    WireValue::Array(items.into_iter().map(WireValue::Object).collect())
}

fn round_id(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

/// `changeState` broadcast.
pub fn change_state(phase: Phase, round: u64, bet_end_ms: i64, server_ms: i64, time_left_ms: i64) -> Message {
    let body = WireObject::new()
        .with("newStateId", phase.wire_id())
        .with("code", CODE_OK)
        .with("roundId", round_id(round))
        .with("betStateEndTime", bet_end_ms)
        .with("serverTime", server_ms)
        .with("timeLeft", time_left_ms);
    Message::extension("changeState", body, None)
}

/// `x` broadcast with the current multiplier.
pub fn multiplier(x: f64) -> Message {
    Message::extension("x", ok().with("x", x), None)
}

/// `crashX` broadcast with the final multiplier.
pub fn crash(x: f64) -> Message {
    Message::extension("crashX", ok().with("crashX", x).with("x", x), None)
}

/// `roundChartInfo` broadcast.
pub fn round_chart(round: u64, max_multiplier: f64) -> Message {
    let body = ok().with("maxMultiplier", max_multiplier).with("roundId", round_id(round));
    Message::extension("roundChartInfo", body, None)
}

/// `onlinePlayers` broadcast.
pub fn online_players(count: u64) -> Message {
    let body = ok().with("onlinePlayers", i64::try_from(count).unwrap_or(i64::MAX));
    Message::extension("onlinePlayers", body, None)
}

/// `newBalance` unicast.
pub fn new_balance(balance: Money) -> Message {
    Message::extension("newBalance", ok().with("newBalance", balance.to_f64()), None)
}

fn bet_object(bet: &Bet) -> WireObject {
    let (win, win_amount, payout) = match &bet.cash_out {
        Some(c) => (true, c.payout, c.multiplier),
        None => (false, Money::ZERO, 0.0),
    };
    WireObject::new()
        .with("bet", bet.stake.to_f64())
        .with("player_id", bet.player.to_string())
        .with("betId", i32::from(bet.slot.index()))
        .with("isFreeBet", false)
        .with("currency", bet.currency.as_str())
        .with("profileImage", "")
        .with("username", bet.username.as_str())
        .with("win", win)
        .with("roundBetId", bet.round_bet_id as i32)
        .with("winAmount", win_amount.to_f64())
        .with("payout", payout)
}

fn cash_out_object(round: &Round, event: &CashOutEvent) -> WireObject {
    let currency = round.bet(event.player, event.slot).map_or("", |b| b.currency.as_str());
    WireObject::new()
        .with("player_id", event.player.to_string())
        .with("winAmount", event.payout.to_f64())
        .with("multiplier", event.multiplier)
        .with("betId", i32::from(event.slot.index()))
        .with("currency", currency)
}

fn no_images() -> WireValue {
    WireValue::StringArray(Vec::new())
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// `updateCurrentBets` broadcast.
pub fn current_bets(round: &Round) -> Message {
    let body = WireObject::new()
        .with("betsCount", count(round.bets().len()))
        .with("code", CODE_OK)
        .with("activePlayersCount", count(round.player_count()))
        .with("bets", list(round.bets().iter().map(bet_object)))
        .with("topPlayerProfileImages", no_images());
    Message::extension("updateCurrentBets", body, None)
}

/// `updateCurrentCashOuts` broadcast.
pub fn current_cash_outs(round: &Round) -> Message {
    let body = WireObject::new()
        .with("openBetsCount", count(round.open_count()))
        .with("code", CODE_OK)
        .with("cashouts", list(round.cash_outs().iter().map(|c| cash_out_object(round, c))))
        .with("activePlayersCount", count(round.player_count()))
        .with("totalCashOut", round.total_cashed_out().to_f64())
        .with("topPlayerProfileImages", no_images());
    Message::extension("updateCurrentCashOuts", body, None)
}

/// `bet` response for an accepted bet.
pub fn bet_placed(bet: &Bet, request_id: Option<i64>) -> Message {
    let body = ok()
        .with("bet", bet.stake.to_f64())
        .with("player_id", bet.player.to_string())
        .with("freeBet", false)
        .with("betId", i32::from(bet.slot.index()))
        .with("profileImage", "")
        .with("username", bet.username.as_str())
        .with("autoCashOut", bet.auto_cash_out.unwrap_or(0.0));
    Message::extension("bet", body, request_id)
}

/// `cancelBet` response.
pub fn bet_cancelled(bet: &Bet, request_id: Option<i64>) -> Message {
    let body = WireObject::new()
        .with("betId", i32::from(bet.slot.index()))
        .with("code", CODE_OK)
        .with("player_id", bet.player.to_string());
    Message::extension("cancelBet", body, request_id)
}

/// `cashOut` response.
pub fn cashed_out(event: &CashOutEvent, request_id: Option<i64>) -> Message {
    let entry = WireObject::new()
        .with("betAmount", event.stake.to_f64())
        .with("winAmount", event.payout.to_f64())
        .with("player_id", event.player.to_string())
        .with("betId", i32::from(event.slot.index()))
        .with("isMaxWinAutoCashOut", event.max_win);
    let body = ok()
        .with("cashouts", list([entry]))
        .with("multiplier", event.multiplier)
        .with("operatorKey", "");
    Message::extension("cashOut", body, request_id)
}

/// Rejection under the command's own response name.
pub fn rejected(response: &str, reason: &RejectReason, slot: Option<i64>, request_id: Option<i64>) -> Message {
    let mut body = WireObject::new().with("code", reason.code()).with("reason", reason.to_string());
    if let Some(slot) = slot {
        body.insert("betId", i32::try_from(slot).unwrap_or(0));
    }
    Message::extension(response, body, request_id)
}

/// `currentBetsInfo` response.
pub fn current_bets_info(round: &Round, request_id: Option<i64>) -> Message {
    let body = WireObject::new()
        .with("betsCount", count(round.bets().len()))
        .with("openBetsCount", count(round.open_count()))
        .with("code", CODE_OK)
        .with("cashOuts", list(round.cash_outs().iter().map(|c| cash_out_object(round, c))))
        .with("activePlayersCount", count(round.player_count()))
        .with("bets", list(round.bets().iter().map(bet_object)))
        .with("topPlayerProfileImages", no_images())
        .with("totalCashOut", round.total_cashed_out().to_f64());
    Message::extension("currentBetsInfo", body, request_id)
}

fn round_info(record: &RoundRecord) -> WireObject {
    WireObject::new()
        .with("multiplier", record.multiplier)
        .with("roundStartDate", record.started_at_ms)
        .with("roundEndDate", record.ended_at_ms)
        .with("roundId", round_id(record.round_id))
}

/// `previousRoundInfo` response; empty lists before the first round ends.
pub fn previous_round_info(previous: Option<&RoundSummary>, request_id: Option<i64>) -> Message {
    let body = match previous {
        Some(summary) => {
            let record = RoundRecord {
                round_id: summary.round_id,
                multiplier: summary.multiplier,
                started_at_ms: summary.started_at_ms,
                ended_at_ms: summary.ended_at_ms,
            };
            WireObject::new()
                .with("roundInfo", round_info(&record))
                .with("code", CODE_OK)
                .with("bets", list(summary.bets.iter().map(bet_object)))
        },
        None => WireObject::new().with("code", CODE_OK).with("bets", WireValue::Array(Vec::new())),
    };
    Message::extension("previousRoundInfo", body, request_id)
}

fn win_object(win: &WinRecord) -> WireObject {
    WireObject::new()
        .with("roundId", round_id(win.round_id))
        .with("username", win.username.as_str())
        .with("currency", win.currency.as_str())
        .with("bet", win.stake.to_f64())
        .with("winAmount", win.payout.to_f64())
        .with("payout", win.multiplier)
        .with("roundMaxMultiplier", win.round_multiplier)
        .with("endDate", win.ended_at_ms)
}

/// `topWinsInfo` or `hugeWinsInfo` response.
pub fn wins(response: &str, wins: &[WinRecord], request_id: Option<i64>) -> Message {
    Message::extension(response, ok().with("wins", list(wins.iter().map(win_object))), request_id)
}

/// `topRoundsInfo` response.
pub fn top_rounds(rounds: &[RoundRecord], request_id: Option<i64>) -> Message {
    Message::extension("topRoundsInfo", ok().with("rounds", list(rounds.iter().map(round_info))), request_id)
}

/// Values for the `init` message sent after login.
#[derive(Debug, Clone)]
pub struct InitView<'a> {
    /// Recent rounds, newest first
    pub rounds: Vec<&'a RoundRecord>,
    /// The player's bets in the current round
    pub active_bets: Vec<&'a Bet>,
    /// Display online count
    pub online_players: u64,
    /// Current round id
    pub round_id: u64,
    /// Current phase
    pub phase: Phase,
    /// Current multiplier
    pub multiplier: f64,
}

/// `init` message describing the lobby to a freshly logged-in player.
pub fn init(
    view: &InitView<'_>,
    player: &Player,
    config: &EngineConfig,
    ping_interval_ms: i32,
) -> Message {
    let user = WireObject::new()
        .with("balance", player.balance().to_f64())
        .with("userId", player.id.to_string())
        .with("username", player.username.as_str())
        .with("currency", player.currency.as_str())
        .with("profileImage", player.profile_image.as_str());
    let settings = WireObject::new()
        .with("minBet", config.min_bet.to_f64())
        .with("maxBet", config.max_bet.to_f64())
        .with("currency", config.currency.as_str())
        .with("maxUserWin", config.max_user_win.to_f64())
        .with("autoCashOutMin", config.auto_cash_out_min)
        .with("autoCashOutMax", config.auto_cash_out_max)
        .with("betPrecision", 2i32)
        .with("multiplierPrecision", 2i32)
        .with("pingIntervalMs", ping_interval_ms)
        .with("isMultipleBetsEnabled", true);
    let body = WireObject::new()
        .with("roundsInfo", list(view.rounds.iter().map(|r| round_info(r))))
        .with("code", CODE_OK)
        .with("activeBets", list(view.active_bets.iter().map(|b| bet_object(b))))
        .with("onlinePlayers", i64::try_from(view.online_players).unwrap_or(i64::MAX))
        .with("user", user)
        .with("config", settings)
        .with("roundId", round_id(view.round_id))
        .with("stageId", view.phase.wire_id())
        .with("currentMultiplier", view.multiplier);
    Message::extension("init", body, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlayerId, Slot};

    fn payload_body(message: &Message) -> &WireObject {
        message.payload.get_object("p").unwrap()
    }

    #[test]
    fn change_state_fields() {
        let message = change_state(Phase::CashOut, 7, 1000, 2000, 0);

        assert_eq!(message.payload.get_str("c"), Some("changeState"));
        let body = payload_body(&message);
        assert_eq!(body.get("newStateId"), Some(&WireValue::Int(2)));
        assert_eq!(body.get("roundId"), Some(&WireValue::Long(7)));
        assert_eq!(body.get("code"), Some(&WireValue::Int(200)));
    }

    #[test]
    fn rejection_carries_code_reason_and_slot() {
        let message = rejected("bet", &RejectReason::SlotOccupied(1), Some(1), Some(9));

        let body = payload_body(&message);
        assert_eq!(body.get("code"), Some(&WireValue::Int(409)));
        assert_eq!(body.get_str("reason"), Some("bet slot 1 already in use"));
        assert_eq!(body.get("betId"), Some(&WireValue::Int(1)));
        assert_eq!(message.payload.get_i64("r"), Some(9));
    }

    #[test]
    fn bet_placed_echoes_slot() {
        let bet = Bet {
            player: PlayerId::new(5),
            username: "ann".to_owned(),
            currency: "USD".to_owned(),
            slot: Slot::Second,
            stake: Money::from_major(10),
            auto_cash_out: None,
            round_bet_id: 1,
            cash_out: None,
            abandoned: false,
        };

        let body = payload_body(&bet_placed(&bet, None)).clone();

        assert_eq!(body.get("betId"), Some(&WireValue::Int(2)));
        assert_eq!(body.get_f64("bet"), Some(10.0));
        assert_eq!(body.get_str("player_id"), Some("5"));
    }
}
