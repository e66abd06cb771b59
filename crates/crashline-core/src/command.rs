//! Gameplay commands carried by extension calls.

use crashline_proto::WireObject;

use crate::CommandError;

/// Parameters of a bet.
#[derive(Debug, Clone, PartialEq)]
pub struct BetRequest {
    /// Slot index as sent; validated by the engine
    pub slot: i64,
    /// Stake as sent
    pub stake: f64,
    /// Auto-cash-out threshold; absent or zero means none
    pub auto_cash_out: Option<f64>,
}

/// Typed extension command.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    /// `betHandler`
    Bet(BetRequest),
    /// `cancelBetHandler`
    CancelBet {
        /// Slot index as sent
        slot: i64,
    },
    /// `cashOutHandler`
    CashOut {
        /// Slot index as sent
        slot: i64,
    },
    /// `currentBetsInfoHandler`
    CurrentBetsInfo,
    /// `previousRoundInfoHandler`
    PreviousRoundInfo,
    /// `getHugeWinsInfoHandler`
    HugeWinsInfo,
    /// `getTopRoundsInfoHandler`
    TopRoundsInfo,
    /// `getTopWinsInfoHandler`
    TopWinsInfo,
}

impl GameCommand {
    /// Parse a command name and its parameters.
    ///
    /// # Errors
    ///
    /// - `CommandError::UnknownCommand` for names outside the table
    /// - `CommandError::Malformed` when a required parameter is missing or
    ///   not numeric
    pub fn parse(name: &str, params: &WireObject) -> Result<Self, CommandError> {
        let command = match name {
            "betHandler" => {
                let stake = params
                    .get_f64("bet")
                    .ok_or(CommandError::Malformed { command: "betHandler", reason: "`bet` must be numeric" })?;
                let slot = params
                    .get_i64("betId")
                    .ok_or(CommandError::Malformed { command: "betHandler", reason: "`betId` must be an integer" })?;
                let auto_cash_out = match params.get("autoCashOut") {
                    None => None,
                    Some(value) => {
                        let threshold = value.as_f64().ok_or(CommandError::Malformed {
                            command: "betHandler",
                            reason: "`autoCashOut` must be numeric",
                        })?;
                        (threshold > 0.0).then_some(threshold)
                    },
                };
                Self::Bet(BetRequest { slot, stake, auto_cash_out })
            },
            "cancelBetHandler" => Self::CancelBet { slot: slot_param("cancelBetHandler", params)? },
            "cashOutHandler" => Self::CashOut { slot: slot_param("cashOutHandler", params)? },
            "currentBetsInfoHandler" => Self::CurrentBetsInfo,
            "previousRoundInfoHandler" => Self::PreviousRoundInfo,
            "getHugeWinsInfoHandler" => Self::HugeWinsInfo,
            "getTopRoundsInfoHandler" => Self::TopRoundsInfo,
            "getTopWinsInfoHandler" => Self::TopWinsInfo,
            other => return Err(CommandError::UnknownCommand(other.to_owned())),
        };
        Ok(command)
    }

    /// Name of the response command.
    pub fn response_name(&self) -> &'static str {
        match self {
            Self::Bet(_) => "bet",
            Self::CancelBet { .. } => "cancelBet",
            Self::CashOut { .. } => "cashOut",
            Self::CurrentBetsInfo => "currentBetsInfo",
            Self::PreviousRoundInfo => "previousRoundInfo",
            Self::HugeWinsInfo => "hugeWinsInfo",
            Self::TopRoundsInfo => "topRoundsInfo",
            Self::TopWinsInfo => "topWinsInfo",
        }
    }
}

fn slot_param(command: &'static str, params: &WireObject) -> Result<i64, CommandError> {
    params.get_i64("betId").ok_or(CommandError::Malformed { command, reason: "`betId` must be an integer" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bet_accepts_mixed_numeric_widths() {
        let params = WireObject::new().with("bet", 10i32).with("betId", 1u8).with("autoCashOut", 2.5f64);

        let command = GameCommand::parse("betHandler", &params).unwrap();

        assert_eq!(command, GameCommand::Bet(BetRequest { slot: 1, stake: 10.0, auto_cash_out: Some(2.5) }));
        assert_eq!(command.response_name(), "bet");
    }

    #[test]
    fn zero_auto_cash_out_means_none() {
        let params = WireObject::new().with("bet", 1.0f64).with("betId", 2i16).with("autoCashOut", 0u8);

        let GameCommand::Bet(request) = GameCommand::parse("betHandler", &params).unwrap() else {
            panic!("expected bet");
        };

        assert_eq!(request.auto_cash_out, None);
    }

    #[test]
    fn wrong_types_are_malformed() {
        let params = WireObject::new().with("bet", "ten").with("betId", 1u8);

        let err = GameCommand::parse("betHandler", &params).unwrap_err();

        assert!(matches!(err, CommandError::Malformed { command: "betHandler", .. }));
        assert!(GameCommand::parse("cashOutHandler", &WireObject::new()).is_err());
    }

    #[test]
    fn unknown_names_are_reported() {
        assert_eq!(
            GameCommand::parse("chatHandler", &WireObject::new()),
            Err(CommandError::UnknownCommand("chatHandler".to_owned()))
        );
    }

    #[test]
    fn queries_need_no_params() {
        for (name, response) in [
            ("currentBetsInfoHandler", "currentBetsInfo"),
            ("previousRoundInfoHandler", "previousRoundInfo"),
            ("getHugeWinsInfoHandler", "hugeWinsInfo"),
            ("getTopRoundsInfoHandler", "topRoundsInfo"),
            ("getTopWinsInfoHandler", "topWinsInfo"),
        ] {
            let command = GameCommand::parse(name, &WireObject::new()).unwrap();
            assert_eq!(command.response_name(), response);
        }
    }
}
