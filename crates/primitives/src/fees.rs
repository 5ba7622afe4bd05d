// Copyright 2022 Conflux Foundation. All rights reserved.
// Conflux is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! The fee schedule. Fees are denominated in credits; credits are bought
//! with ACME at the oracle price and are not transferable.

use crate::{
    errors::{Error, Result},
    transaction::{Transaction, TransactionType},
};

/// Credits granted per ACME token at an oracle price of one dollar,
/// scaled by the oracle precision.
pub const CREDITS_PER_DOLLAR: u64 = 100;

/// The oracle price is expressed in hundredths of a cent per ACME.
pub const ORACLE_PRECISION: u64 = 10_000;

/// The most a failed transaction may keep; the rest is refunded to the
/// initiator.
pub const FEE_FAILED_MAXIMUM: u64 = 100;

/// Flat fee charged per signature beyond the first.
pub const FEE_SIGNATURE: u64 = 1;

/// Every 256 bytes of transaction beyond the first 256 adds this much.
pub const FEE_DATA_SURCHARGE: u64 = 10;

/// Identity creation is deliberately expensive.
pub const FEE_CREATE_IDENTITY: u64 = 500_000;

pub const FEE_CREATE_ACCOUNT: u64 = 2_500;
pub const FEE_TRANSFER_TOKENS: u64 = 300;
pub const FEE_CREATE_TOKEN: u64 = 500_000;
pub const FEE_WRITE_DATA: u64 = 10;
pub const FEE_UPDATE_AUTH: u64 = 300;
pub const FEE_UPDATE_KEY: u64 = 100;
pub const FEE_MINIMUM: u64 = 100;

/// Computes the fee for a user transaction. Synthetic and system
/// transactions carry no fee; their cost was paid by their cause.
pub fn compute_transaction_fee(txn: &Transaction) -> Result<u64> {
    use TransactionType::*;

    let typ = txn.transaction_type();
    if !typ.is_user() {
        return Ok(0);
    }

    let base = match typ {
        CreateIdentity => FEE_CREATE_IDENTITY,
        CreateTokenAccount | CreateDataAccount | CreateKeyPage
        | CreateKeyBook => FEE_CREATE_ACCOUNT,
        SendTokens | IssueTokens | BurnTokens | AddCredits => {
            FEE_TRANSFER_TOKENS
        }
        CreateToken => FEE_CREATE_TOKEN,
        WriteData | WriteDataTo => FEE_WRITE_DATA,
        UpdateKeyPage | UpdateAccountAuth => FEE_UPDATE_AUTH,
        UpdateKey => FEE_UPDATE_KEY,
        AcmeFaucet | Remote => 0,
        _ => FEE_MINIMUM,
    };
    if base == 0 {
        return Ok(0);
    }

    let size = acd_encoding::encode(txn).len();
    if size > u16::MAX as usize {
        return Err(Error::bad_request(format!(
            "transaction size {} exceeds the limit",
            size
        )));
    }
    let surcharge = (size.saturating_sub(1) / 256) as u64 * FEE_DATA_SURCHARGE;
    Ok(base + surcharge)
}

/// Credits purchased by spending `acme` base units at `oracle` (hundredths
/// of a cent per ACME), with `precision` decimal places on the token.
pub fn credits_for_acme(acme: u128, oracle: u64, precision: u64) -> u64 {
    let unit = 10u128.pow(precision as u32);
    let credits = acme * u128::from(oracle) * u128::from(CREDITS_PER_DOLLAR)
        / u128::from(ORACLE_PRECISION)
        / unit;
    credits.min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{SendTokens, TokenRecipient, TransactionBody};
    use acd_types::Url;

    fn send(memo_len: usize) -> Transaction {
        let mut txn = Transaction::new(
            Url::parse("acc://alice/tokens").unwrap(),
            TransactionBody::SendTokens(SendTokens {
                to: vec![TokenRecipient {
                    url: Url::parse("acc://bob/tokens").unwrap(),
                    amount: 30,
                }],
            }),
        );
        txn.header.memo = "m".repeat(memo_len);
        txn
    }

    #[test]
    fn size_surcharge_applies_past_first_block() {
        let small = compute_transaction_fee(&send(0)).unwrap();
        assert_eq!(small, FEE_TRANSFER_TOKENS);
        let large = compute_transaction_fee(&send(1024)).unwrap();
        assert!(large > small);
        assert_eq!((large - small) % FEE_DATA_SURCHARGE, 0);
    }

    #[test]
    fn system_transactions_are_free() {
        let txn = Transaction::new(
            Url::parse("acc://dn.acme").unwrap(),
            TransactionBody::SystemGenesis(Default::default()),
        );
        assert_eq!(compute_transaction_fee(&txn).unwrap(), 0);
    }

    #[test]
    fn credit_purchase_follows_oracle() {
        // 5 ACME at $0.50 with precision 8 buys 250 credits.
        let credits = credits_for_acme(5 * 100_000_000, 5_000, 8);
        assert_eq!(credits, 250);
    }
}
