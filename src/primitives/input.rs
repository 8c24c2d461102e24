//! Transaction input pointers.

use super::TxHash;

/// A pointer to an unspent output: producing transaction id plus output
/// index. Ordered lexicographically (id first), which is the canonical
/// ordering everywhere inputs are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionInput {
    pub transaction_id: TxHash,
    pub index: u64,
}

impl TransactionInput {
    pub fn new(transaction_id: TxHash, index: u64) -> Self {
        Self {
            transaction_id,
            index,
        }
    }
}

impl std::fmt::Display for TransactionInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.transaction_id, self.index)
    }
}

impl<C> minicbor::encode::Encode<C> for TransactionInput {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?
            .bytes(self.transaction_id.as_ref())?
            .u64(self.index)?;
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for TransactionInput {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let _ = d.array()?;
        let id: [u8; 32] = d
            .bytes()?
            .try_into()
            .map_err(|_| minicbor::decode::Error::message("transaction id must be 32 bytes"))?;
        Ok(TransactionInput {
            transaction_id: TxHash::from(id),
            index: d.u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_id_then_index() {
        let a = TransactionInput::new(TxHash::from([1u8; 32]), 9);
        let b = TransactionInput::new(TxHash::from([2u8; 32]), 0);
        let c = TransactionInput::new(TxHash::from([2u8; 32]), 1);
        assert!(a < b);
        assert!(b < c);
    }
}
