//! Statement rows produced by the external parsers
//!
//! Parsing OFX text and ChipPix spreadsheets happens outside the engine; these
//! are the tuples it hands over.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bank statement line (OFX `STMTTRN`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfxRow {
    pub fitid: String,
    pub date: NaiveDate,
    /// Signed: positive is a credit to the club account
    pub amount: Decimal,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub bank: String,
}

/// One aggregated ChipPix export line (per player id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChipPixRow {
    pub id_jog: String,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub entrada: Decimal,
    #[serde(default)]
    pub saida: Decimal,
    #[serde(default)]
    pub taxa: Decimal,
    /// Number of processor transactions folded into this row
    #[serde(default)]
    pub txns: u32,
    #[serde(default)]
    pub datas: Vec<NaiveDate>,
}
