//! Scripts: native timelocks and the three Plutus language versions.

use std::collections::BTreeSet;

use pallas_crypto::hash::Hasher;

use super::{AddrKeyhash, ScriptHash, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

impl Language {
    /// The language tag used both for script hashing and for the cost-model
    /// map keys.
    pub fn tag(&self) -> u8 {
        match self {
            Language::PlutusV1 => 1,
            Language::PlutusV2 => 2,
            Language::PlutusV3 => 3,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::PlutusV1 => write!(f, "plutus:v1"),
            Language::PlutusV2 => write!(f, "plutus:v2"),
            Language::PlutusV3 => write!(f, "plutus:v3"),
        }
    }
}

/// Phase-1 scripts: key requirements and time locks, evaluated against the
/// transaction's signatories and validity interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeScript {
    ScriptPubkey(AddrKeyhash),
    ScriptAll(Vec<NativeScript>),
    ScriptAny(Vec<NativeScript>),
    ScriptNOfK(u32, Vec<NativeScript>),
    InvalidBefore(Slot),
    InvalidHereafter(Slot),
}

impl NativeScript {
    /// Evaluates the script against the witnesses' key hashes and the
    /// transaction validity interval `[validity_start, ttl]`.
    ///
    /// Time locks require the corresponding interval bound to be present:
    /// an open bound never satisfies a lock.
    pub fn eval(
        &self,
        validity_start: Option<Slot>,
        ttl: Option<Slot>,
        signatories: &BTreeSet<AddrKeyhash>,
    ) -> bool {
        match self {
            NativeScript::ScriptPubkey(key) => signatories.contains(key),
            NativeScript::ScriptAll(scripts) => scripts
                .iter()
                .all(|script| script.eval(validity_start, ttl, signatories)),
            NativeScript::ScriptAny(scripts) => scripts
                .iter()
                .any(|script| script.eval(validity_start, ttl, signatories)),
            NativeScript::ScriptNOfK(n, scripts) => {
                let satisfied = scripts
                    .iter()
                    .filter(|script| script.eval(validity_start, ttl, signatories))
                    .count();
                satisfied as u32 >= *n
            }
            NativeScript::InvalidBefore(lock) => {
                validity_start.is_some_and(|start| *lock <= start)
            }
            NativeScript::InvalidHereafter(lock) => ttl.is_some_and(|end| end <= *lock),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        minicbor::to_vec(self).expect("native script encoding to a vector cannot fail")
    }
}

impl<C> minicbor::encode::Encode<C> for NativeScript {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            NativeScript::ScriptPubkey(key) => {
                e.array(2)?.u8(0)?.bytes(key.as_ref())?;
            }
            NativeScript::ScriptAll(scripts) => {
                e.array(2)?.u8(1)?;
                e.array(scripts.len() as u64)?;
                for script in scripts {
                    script.encode(e, ctx)?;
                }
            }
            NativeScript::ScriptAny(scripts) => {
                e.array(2)?.u8(2)?;
                e.array(scripts.len() as u64)?;
                for script in scripts {
                    script.encode(e, ctx)?;
                }
            }
            NativeScript::ScriptNOfK(n, scripts) => {
                e.array(3)?.u8(3)?.u32(*n)?;
                e.array(scripts.len() as u64)?;
                for script in scripts {
                    script.encode(e, ctx)?;
                }
            }
            NativeScript::InvalidBefore(slot) => {
                e.array(2)?.u8(4)?.u64(*slot)?;
            }
            NativeScript::InvalidHereafter(slot) => {
                e.array(2)?.u8(5)?.u64(*slot)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for NativeScript {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        fn many(
            d: &mut minicbor::decode::Decoder<'_>,
        ) -> Result<Vec<NativeScript>, minicbor::decode::Error> {
            let len = d
                .array()?
                .ok_or_else(|| minicbor::decode::Error::message("indefinite script list"))?;
            (0..len).map(|_| d.decode()).collect()
        }

        let _ = d.array()?;
        match d.u8()? {
            0 => {
                let key: [u8; 28] = d.bytes()?.try_into().map_err(|_| {
                    minicbor::decode::Error::message("key hash must be 28 bytes")
                })?;
                Ok(NativeScript::ScriptPubkey(AddrKeyhash::from(key)))
            }
            1 => Ok(NativeScript::ScriptAll(many(d)?)),
            2 => Ok(NativeScript::ScriptAny(many(d)?)),
            3 => {
                let n = d.u32()?;
                Ok(NativeScript::ScriptNOfK(n, many(d)?))
            }
            4 => Ok(NativeScript::InvalidBefore(d.u64()?)),
            5 => Ok(NativeScript::InvalidHereafter(d.u64()?)),
            other => Err(minicbor::decode::Error::message(format!(
                "unknown native script kind {other}"
            ))),
        }
    }
}

/// A script as carried in witness sets and output script references.
/// Plutus variants hold the CBOR-wrapped flat program bytes, exactly as
/// they appear on the wire (the hashing preimage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    Native(NativeScript),
    PlutusV1(Vec<u8>),
    PlutusV2(Vec<u8>),
    PlutusV3(Vec<u8>),
}

impl Script {
    pub fn language(&self) -> Option<Language> {
        match self {
            Script::Native(_) => None,
            Script::PlutusV1(_) => Some(Language::PlutusV1),
            Script::PlutusV2(_) => Some(Language::PlutusV2),
            Script::PlutusV3(_) => Some(Language::PlutusV3),
        }
    }

    pub fn is_plutus(&self) -> bool {
        self.language().is_some()
    }

    /// BLAKE2b-224 over a language discriminant byte followed by the script
    /// body bytes.
    pub fn hash(&self) -> ScriptHash {
        let mut hasher = Hasher::<224>::new();
        match self {
            Script::Native(script) => {
                hasher.input(&[0]);
                hasher.input(&script.to_vec());
            }
            Script::PlutusV1(bytes) => {
                hasher.input(&[1]);
                hasher.input(bytes);
            }
            Script::PlutusV2(bytes) => {
                hasher.input(&[2]);
                hasher.input(bytes);
            }
            Script::PlutusV3(bytes) => {
                hasher.input(&[3]);
                hasher.input(bytes);
            }
        }
        hasher.finalize()
    }

    pub fn plutus_bytes(&self) -> Option<&[u8]> {
        match self {
            Script::Native(_) => None,
            Script::PlutusV1(bytes) | Script::PlutusV2(bytes) | Script::PlutusV3(bytes) => {
                Some(bytes)
            }
        }
    }
}

impl<C> minicbor::encode::Encode<C> for Script {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        match self {
            Script::Native(script) => {
                e.u8(0)?;
                script.encode(e, ctx)?;
            }
            Script::PlutusV1(bytes) => {
                e.u8(1)?.bytes(bytes)?;
            }
            Script::PlutusV2(bytes) => {
                e.u8(2)?.bytes(bytes)?;
            }
            Script::PlutusV3(bytes) => {
                e.u8(3)?.bytes(bytes)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> minicbor::decode::Decode<'b, C> for Script {
    fn decode(
        d: &mut minicbor::decode::Decoder<'b>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        let _ = d.array()?;
        match d.u8()? {
            0 => Ok(Script::Native(d.decode()?)),
            1 => Ok(Script::PlutusV1(d.bytes()?.to_vec())),
            2 => Ok(Script::PlutusV2(d.bytes()?.to_vec())),
            3 => Ok(Script::PlutusV3(d.bytes()?.to_vec())),
            other => Err(minicbor::decode::Error::message(format!(
                "unknown script kind {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> AddrKeyhash {
        AddrKeyhash::from([n; 28])
    }

    #[test]
    fn pubkey_script_requires_the_signatory() {
        let script = NativeScript::ScriptPubkey(key(1));
        let mut signatories = BTreeSet::new();
        assert!(!script.eval(None, None, &signatories));
        signatories.insert(key(1));
        assert!(script.eval(None, None, &signatories));
    }

    #[test]
    fn time_locks_require_a_bound() {
        let before = NativeScript::InvalidBefore(100);
        assert!(!before.eval(None, None, &BTreeSet::new()));
        assert!(before.eval(Some(100), None, &BTreeSet::new()));
        assert!(!before.eval(Some(99), None, &BTreeSet::new()));

        let after = NativeScript::InvalidHereafter(200);
        assert!(!after.eval(None, None, &BTreeSet::new()));
        assert!(after.eval(None, Some(200), &BTreeSet::new()));
        assert!(!after.eval(None, Some(201), &BTreeSet::new()));
    }

    #[test]
    fn n_of_k_counts_satisfied_branches() {
        let script = NativeScript::ScriptNOfK(
            2,
            vec![
                NativeScript::ScriptPubkey(key(1)),
                NativeScript::ScriptPubkey(key(2)),
                NativeScript::ScriptPubkey(key(3)),
            ],
        );
        let signatories: BTreeSet<_> = [key(1), key(3)].into();
        assert!(script.eval(None, None, &signatories));
        let too_few: BTreeSet<_> = [key(2)].into();
        assert!(!script.eval(None, None, &too_few));
    }

    #[test]
    fn script_hashes_are_language_tagged() {
        let bytes = vec![0x01, 0x02, 0x03];
        let v1 = Script::PlutusV1(bytes.clone());
        let v2 = Script::PlutusV2(bytes);
        assert_ne!(v1.hash(), v2.hash());
    }
}
