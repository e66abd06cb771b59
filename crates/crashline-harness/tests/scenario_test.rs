//! Named gameplay scenarios through the full driver.
//!
//! Each scenario runs on a manually clocked `SimServer` and checks the
//! standard invariants after every step.
//!
//! Timeline with default durations and 100 ms ticks: Ready until 2000 ms,
//! Bet until 7000 ms, then CashOut.

use std::time::Duration;

use crashline_core::{BotConfig, CrashPoint, EngineConfig, Money, Phase};
use crashline_harness::{InvariantRegistry, SimServer};
use crashline_proto::WireObject;
use crashline_server::DriverConfig;

const TICK: Duration = Duration::from_millis(100);
const BET_OPENS: Duration = Duration::from_millis(2000);
const BET_CLOSES: Duration = Duration::from_millis(7000);

fn no_bots() -> BotConfig {
    BotConfig { min_count: 0, max_count: 0, ..BotConfig::default() }
}

fn engine(crash_at: f64) -> EngineConfig {
    EngineConfig {
        crash: CrashPoint::Fixed(crash_at),
        starting_balance: Money::from_major(100),
        bots: no_bots(),
        ..EngineConfig::default()
    }
}

fn server(engine: EngineConfig) -> SimServer {
    SimServer::new(DriverConfig { engine, ..DriverConfig::default() }, 7)
}

/// Advance to `until` since start, checking invariants after every tick.
fn run_to(server: &mut SimServer, until: Duration) {
    let invariants = InvariantRegistry::standard();
    while server.elapsed() < until {
        server.advance(TICK).unwrap();
        invariants.assert_all(&server.snapshot(), &format!("at {:?}", server.elapsed()));
    }
}

fn last<'a>(server: &'a SimServer, session: u64, command: &str) -> &'a WireObject {
    server.responses(session, command).last().copied().unwrap_or_else(|| panic!("no `{command}` received"))
}

fn state_ids(server: &SimServer, session: u64) -> Vec<i64> {
    server.responses(session, "changeState").iter().filter_map(|s| s.get_i64("newStateId")).collect()
}

#[test]
fn scenario_a_accepted_bet_debits_balance() {
    let mut server = server(engine(2.0));
    let alice = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    run_to(&mut server, BET_OPENS);
    assert_eq!(server.phase(), Phase::Bet);

    server.bet(alice, 1, 10.0, None).unwrap();

    let reply = last(&server, alice, "bet");
    assert_eq!(reply.get_i64("code"), Some(200));
    assert_eq!(reply.get_i64("betId"), Some(1));
    assert_eq!(server.balance(alice), Some(Money::from_major(90)));
    assert_eq!(last(&server, alice, "newBalance").get_f64("newBalance"), Some(90.0));
    InvariantRegistry::standard().assert_all(&server.snapshot(), "after bet");
}

#[test]
fn scenario_b_second_bet_on_same_slot_rejected() {
    let mut server = server(engine(2.0));
    let alice = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    run_to(&mut server, BET_OPENS);
    server.bet(alice, 1, 10.0, None).unwrap();

    server.bet(alice, 1, 10.0, None).unwrap();

    let reply = last(&server, alice, "bet");
    assert_eq!(reply.get_i64("code"), Some(409));
    assert_eq!(reply.get_i64("betId"), Some(1));
    assert!(reply.get_str("reason").is_some());
    assert_eq!(server.balance(alice), Some(Money::from_major(90)));
    assert_eq!(server.snapshot().round.bets.len(), 1);
}

#[test]
fn scenario_c_bet_window_closes_into_cash_out() {
    let mut server = server(engine(2.0));
    let watcher = server.connect().unwrap();
    server.login(watcher, "watcher").unwrap();

    run_to(&mut server, BET_CLOSES - TICK);
    assert_eq!(server.phase(), Phase::Bet);
    assert_eq!(state_ids(&server, watcher), [1]);

    run_to(&mut server, BET_CLOSES);
    assert_eq!(server.phase(), Phase::CashOut);
    assert_eq!(state_ids(&server, watcher), [1, 2]);
}

#[test]
fn scenario_d_multiplier_after_one_second() {
    let mut server = server(engine(5.0));
    let watcher = server.connect().unwrap();
    server.login(watcher, "watcher").unwrap();

    run_to(&mut server, BET_CLOSES + Duration::from_millis(1000));

    let expected = 0.99 * (0.0752f64 * 1.0).exp();
    let snapshot = server.snapshot();
    assert_eq!(server.phase(), Phase::CashOut);
    assert!((snapshot.round.multiplier - expected).abs() < 1e-9, "got {}", snapshot.round.multiplier);
    assert!((snapshot.round.multiplier - 1.0673).abs() < 1e-3);

    let broadcast = last(&server, watcher, "x").get_f64("x").unwrap();
    assert!((broadcast - expected).abs() < 1e-9);
}

#[test]
fn scenario_e_house_risk_settles_at_last_safe_multiplier() {
    // One bot stakes 48 with no liability. Alice stakes 50 and leaves at
    // 1.9 for 95; Bob's open 2 then caps the multiplier at 2.5.
    let engine = EngineConfig {
        bots: BotConfig {
            min_count: 1,
            max_count: 1,
            stakes: vec![Money::from_major(48)],
            auto_chance: 0.0,
            ..BotConfig::default()
        },
        ..engine(10.0)
    };
    let mut server = server(engine);
    let alice = server.connect().unwrap();
    let bob = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    server.login(bob, "bob").unwrap();
    run_to(&mut server, BET_OPENS);
    server.bet(alice, 1, 50.0, Some(1.9)).unwrap();
    server.bet(bob, 1, 2.0, None).unwrap();

    assert!(server.run_until(Phase::Settle, TICK, Duration::from_secs(60)).unwrap());

    let snapshot = server.snapshot();
    assert_eq!(snapshot.round.total_stake, 10_000);
    assert_eq!(snapshot.round.total_paid, 9_500);
    assert_eq!(server.balance(alice), Some(Money::from_major(145)));
    assert_eq!(server.balance(bob), Some(Money::from_major(98)));

    let crash = last(&server, bob, "crashX").get_f64("crashX").unwrap();
    assert!(crash > 2.4 && crash < 2.5, "settled at {crash}");
    let bob_liability = Money::from_major(2).scale(crash).minor();
    assert!(snapshot.round.total_paid + bob_liability <= snapshot.round.total_stake);

    for x in server.responses(bob, "x").iter().filter_map(|b| b.get_f64("x")) {
        assert!(x <= crash, "unsafe multiplier {x} was broadcast");
    }
    InvariantRegistry::standard().assert_all(&snapshot, "after settle");
}

#[test]
fn cancel_refunds_and_frees_slot() {
    let mut server = server(engine(2.0));
    let alice = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    run_to(&mut server, BET_OPENS);
    server.bet(alice, 2, 25.0, None).unwrap();

    server.call(alice, "cancelBetHandler", WireObject::new().with("betId", 2i32), Some(5)).unwrap();

    let reply = last(&server, alice, "cancelBet");
    assert_eq!(reply.get_i64("code"), Some(200));
    assert_eq!(server.balance(alice), Some(Money::from_major(100)));
    server.bet(alice, 2, 25.0, None).unwrap();
    assert_eq!(last(&server, alice, "bet").get_i64("code"), Some(200));
}

#[test]
fn cash_out_echoes_request_id_and_pays() {
    let engine = EngineConfig {
        bots: BotConfig {
            min_count: 1,
            max_count: 1,
            stakes: vec![Money::from_major(100)],
            auto_chance: 0.0,
            ..BotConfig::default()
        },
        ..engine(5.0)
    };
    let mut server = server(engine);
    let alice = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    run_to(&mut server, BET_OPENS);
    server.bet(alice, 1, 10.0, None).unwrap();
    run_to(&mut server, BET_CLOSES + Duration::from_millis(1000));
    let multiplier = server.snapshot().round.multiplier;

    server.call(alice, "cashOutHandler", WireObject::new().with("betId", 1i32), Some(77)).unwrap();

    let message = server
        .inbox(alice)
        .iter()
        .rev()
        .find(|m| m.payload.get_str("c") == Some("cashOut"))
        .unwrap();
    assert_eq!(message.payload.get_i64("r"), Some(77));
    let body = message.payload.get_object("p").unwrap();
    assert_eq!(body.get_i64("code"), Some(200));
    assert_eq!(body.get_f64("multiplier"), Some(multiplier));
    let expected = Money::from_major(90) + Money::from_major(10).scale(multiplier);
    assert_eq!(server.balance(alice), Some(expected));

    server.call(alice, "cashOutHandler", WireObject::new().with("betId", 1i32), None).unwrap();
    assert_eq!(last(&server, alice, "cashOut").get_i64("code"), Some(410));
}

#[test]
fn logout_abandons_open_bet() {
    let mut server = server(engine(2.0));
    let alice = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    run_to(&mut server, BET_OPENS);
    server.bet(alice, 1, 10.0, None).unwrap();

    server.disconnect(alice).unwrap();
    run_to(&mut server, BET_CLOSES);

    let snapshot = server.snapshot();
    assert_eq!(snapshot.round.bets.len(), 1);
    assert!(snapshot.round.bets[0].abandoned);
    assert_eq!(snapshot.round.total_stake, 1_000);
    assert!(snapshot.players.is_empty());
}

#[test]
fn settled_round_feeds_history_queries() {
    let engine = EngineConfig {
        bots: BotConfig {
            min_count: 1,
            max_count: 1,
            stakes: vec![Money::from_major(100)],
            auto_chance: 0.0,
            ..BotConfig::default()
        },
        ..engine(1.5)
    };
    let mut server = server(engine);
    let alice = server.connect().unwrap();
    server.login(alice, "alice").unwrap();
    run_to(&mut server, BET_OPENS);
    server.bet(alice, 1, 10.0, Some(1.2)).unwrap();
    assert!(server.run_until(Phase::Settle, TICK, Duration::from_secs(30)).unwrap());

    for (handler, response) in [
        ("previousRoundInfoHandler", "previousRoundInfo"),
        ("getTopWinsInfoHandler", "topWinsInfo"),
        ("getHugeWinsInfoHandler", "hugeWinsInfo"),
        ("getTopRoundsInfoHandler", "topRoundsInfo"),
    ] {
        server.call(alice, handler, WireObject::new(), None).unwrap();
        assert_eq!(last(&server, alice, response).get_i64("code"), Some(200), "{response}");
    }

    let previous = last(&server, alice, "previousRoundInfo");
    let info = previous.get_object("roundInfo").unwrap();
    assert_eq!(info.get_i64("roundId"), Some(1));
    assert_eq!(info.get_f64("multiplier"), Some(1.5));

    let wins = last(&server, alice, "topWinsInfo").get("wins").and_then(|w| w.as_array()).unwrap();
    assert_eq!(wins.len(), 1);
    assert_eq!(server.balance(alice), Some(Money::from_major(102)));
}

#[test]
fn commands_before_login_are_ignored() {
    let mut server = server(engine(2.0));
    let anon = server.connect().unwrap();
    run_to(&mut server, BET_OPENS);

    server.bet(anon, 1, 10.0, None).unwrap();

    assert!(server.inbox(anon).is_empty());
    assert!(server.snapshot().round.bets.is_empty());
    assert!(server.is_connected(anon));
}

#[test]
fn rounds_cycle_with_increasing_ids() {
    let mut server = server(engine(1.2));
    let watcher = server.connect().unwrap();
    server.login(watcher, "watcher").unwrap();

    run_to(&mut server, Duration::from_secs(40));

    let ids: Vec<i64> = server.responses(watcher, "roundChartInfo").iter().filter_map(|r| r.get_i64("roundId")).collect();
    assert!(ids.len() >= 3, "only {} rounds settled", ids.len());
    assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
}
