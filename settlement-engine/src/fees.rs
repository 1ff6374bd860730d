//! Fee & Rake Engine
//!
//! Pure functions over a week's play statistics. Inputs are assumed
//! sanitized: [`FeeRates::validate`] runs at the call boundary and these
//! functions never fail.

use crate::error::EngineResult;
use crate::money::{is_zero, percent_of, round_money, validate_rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::Player;

/// Club fee percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeRates {
    /// App fee on rake
    #[serde(default)]
    pub app: Decimal,
    /// League fee on rake
    #[serde(default)]
    pub liga: Decimal,
    /// Rodeo fee on positive GGR
    #[serde(default)]
    pub rodeo_ggr: Decimal,
    /// Rodeo app fee on positive GGR
    #[serde(default)]
    pub rodeo_app: Decimal,
}

impl FeeRates {
    pub fn validate(&self) -> EngineResult<()> {
        validate_rate(self.app, "app fee rate")?;
        validate_rate(self.liga, "league fee rate")?;
        validate_rate(self.rodeo_ggr, "rodeo GGR fee rate")?;
        validate_rate(self.rodeo_app, "rodeo app fee rate")?;
        Ok(())
    }
}

/// Club-level totals and taxes for one week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClubFinancials {
    pub rake: Decimal,
    pub ggr: Decimal,
    /// Σ winnings
    pub profit_loss: Decimal,
    /// Σ winnings + Σ rake + Σ ggr
    pub resultado_clube: Decimal,
    pub taxa_app: Decimal,
    pub taxa_liga: Decimal,
    pub taxa_rodeo_ggr: Decimal,
    pub taxa_rodeo_app: Decimal,
    pub total_taxas: Decimal,
}

/// Compute club totals and taxes
///
/// Sums are kept at full precision and rounded once per output. Rodeo taxes
/// apply only when the club's GGR is positive; otherwise they are zero.
pub fn compute_club_financials(players: &[Player], rates: &FeeRates) -> ClubFinancials {
    let rake: Decimal = players.iter().map(|p| p.rake).sum();
    let ggr: Decimal = players.iter().map(|p| p.ggr).sum();
    let winnings: Decimal = players.iter().map(|p| p.winnings).sum();

    let taxa_app = round_money(percent_of(rake, rates.app));
    let taxa_liga = round_money(percent_of(rake, rates.liga));
    let (taxa_rodeo_ggr, taxa_rodeo_app) = if ggr > Decimal::ZERO && !is_zero(ggr) {
        (
            round_money(percent_of(ggr, rates.rodeo_ggr)),
            round_money(percent_of(ggr, rates.rodeo_app)),
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    ClubFinancials {
        rake: round_money(rake),
        ggr: round_money(ggr),
        profit_loss: round_money(winnings),
        resultado_clube: round_money(winnings + rake + ggr),
        taxa_app,
        taxa_liga,
        taxa_rodeo_ggr,
        taxa_rodeo_app,
        total_taxas: taxa_app + taxa_liga + taxa_rodeo_ggr + taxa_rodeo_app,
    }
}

/// Weekly result of one settled block (an agent's players, or one player)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockResult {
    pub winnings: Decimal,
    pub rake: Decimal,
    pub rb_rate: Decimal,
    pub rakeback: Decimal,
    /// Amount the block owes the club: −(winnings + rakeback)
    pub resultado: Decimal,
}

/// Settle a block of players at one rakeback rate
pub fn settle_block<'a, I>(players: I, rb_rate: Decimal) -> BlockResult
where
    I: IntoIterator<Item = &'a Player>,
{
    let (winnings, rake) = players
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(w, r), p| {
            (w + p.winnings, r + p.rake)
        });
    let rakeback = percent_of(rake, rb_rate);

    BlockResult {
        winnings: round_money(winnings),
        rake: round_money(rake),
        rb_rate,
        rakeback: round_money(rakeback),
        resultado: round_money(-(winnings + rakeback)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn player(id: &str, rake: &str, winnings: &str, ggr: &str) -> Player {
        Player {
            id: id.to_string(),
            external_id: String::new(),
            nickname: id.to_string(),
            agent_name: "ABC".to_string(),
            rake: dec(rake),
            winnings: dec(winnings),
            ggr: dec(ggr),
            rb_rate_override: None,
        }
    }

    fn rates() -> FeeRates {
        FeeRates {
            app: dec("8"),
            liga: dec("10"),
            rodeo_ggr: dec("12"),
            rodeo_app: dec("18"),
        }
    }

    #[test]
    fn test_club_financials_with_positive_ggr() {
        let players = vec![
            player("p1", "100", "-50", "20"),
            player("p2", "50.50", "30", "10"),
        ];
        let f = compute_club_financials(&players, &rates());

        assert_eq!(f.rake, dec("150.50"));
        assert_eq!(f.ggr, dec("30"));
        assert_eq!(f.profit_loss, dec("-20"));
        assert_eq!(f.resultado_clube, dec("160.50"));
        assert_eq!(f.taxa_app, dec("12.04"));
        assert_eq!(f.taxa_liga, dec("15.05"));
        assert_eq!(f.taxa_rodeo_ggr, dec("3.60"));
        assert_eq!(f.taxa_rodeo_app, dec("5.40"));
        assert_eq!(f.total_taxas, dec("36.09"));
    }

    #[test]
    fn test_rodeo_taxes_zero_when_ggr_not_positive() {
        let players = vec![player("p1", "100", "0", "-40")];
        let f = compute_club_financials(&players, &rates());
        assert_eq!(f.taxa_rodeo_ggr, Decimal::ZERO);
        assert_eq!(f.taxa_rodeo_app, Decimal::ZERO);
        assert_eq!(f.taxa_app, dec("8"));
        assert_eq!(f.total_taxas, dec("18"));
    }

    #[test]
    fn test_empty_week_is_all_zero() {
        let f = compute_club_financials(&[], &rates());
        assert_eq!(f, ClubFinancials::default());
    }

    #[test]
    fn test_fee_rates_validation() {
        assert!(rates().validate().is_ok());
        let bad = FeeRates {
            liga: dec("101"),
            ..rates()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_settle_block() {
        let players = vec![
            player("p1", "200", "-100", "0"),
            player("p2", "100", "40", "0"),
        ];
        let block = settle_block(&players, dec("20"));
        assert_eq!(block.rake, dec("300"));
        assert_eq!(block.rakeback, dec("60"));
        // Net losses of 60 and 60 of rakeback owed back cancel out
        assert_eq!(block.resultado, Decimal::ZERO);

        let block = settle_block(&players[..1], dec("25"));
        assert_eq!(block.rakeback, dec("50"));
        assert_eq!(block.resultado, dec("50"));
    }
}
