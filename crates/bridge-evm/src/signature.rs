// Path: crates/bridge-evm/src/signature.rs
//! The cryptographic core the destination prover contract expects:
//!
//! 1. Recover each signer's Ethereum address via secp256k1 over the batch id.
//! 2. Build the validator merkle tree (leaves sorted deterministically).
//! 3. Sum matched voting power and require it clears the 2/3 consensus threshold.
//! 4. Reformat signatures as `r(32) ‖ s(32) ‖ v(1)`.
//! 5. Sort the resulting bundles by Ethereum address, ascending.

use alloy_primitives::keccak256;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};
use seda_bridge_types::error::ChainPushError;
use seda_bridge_types::model::{Batch, ValidatorEntry};

/// The consensus threshold, expressed in basis points with 2 implied decimal
/// places (`6667` == `66.67%`), matching the literal 2/3 requirement.
pub const CONSENSUS_THRESHOLD_BP: u32 = 6_667;

/// One validator's contribution to a `postBatch` call: its merkle proof,
/// address, voting power, and reformatted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBundle {
    /// This validator's merkle proof against the validator root.
    pub proof: Vec<[u8; 32]>,
    /// The validator's Ethereum address.
    pub eth_address: [u8; 20],
    /// Voting power in basis points (2 implied decimals; 10_000 == 100%).
    pub voting_power_bp: u32,
    /// The signature, reformatted as `r(32) ‖ s(32) ‖ v(1)`.
    pub signature: [u8; 65],
}

fn percent_to_bp(percent: f64) -> u32 {
    (percent * 100.0).round().clamp(0.0, u32::MAX as f64) as u32
}

/// Recovers the 20-byte Ethereum address that produced `raw_signature` over
/// the 32-byte `message` pre-image.
pub fn recover_eth_address(message: &[u8; 32], raw_signature: &[u8; 65]) -> Result<[u8; 20], ChainPushError> {
    let (rs, v_byte) = raw_signature.split_at(64);
    let sig = K256Signature::from_slice(rs).map_err(|e| ChainPushError::InvalidBatch(format!("bad signature bytes: {e}")))?;
    #[allow(clippy::indexing_slicing)]
    let v = v_byte[0];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| ChainPushError::InvalidBatch(format!("invalid recovery id {recovery_byte}")))?;

    let verifying_key = VerifyingKey::recover_from_prehash(message, &sig, recovery_id)
        .map_err(|e| ChainPushError::InvalidBatch(format!("signature recovery failed: {e}")))?;

    let encoded = verifying_key.to_encoded_point(false);
    let pubkey_bytes = encoded.as_bytes();
    // Uncompressed point is `0x04 || X(32) || Y(32)`; the address is the last
    // 20 bytes of keccak256(X || Y).
    let tail = pubkey_bytes.get(1..).ok_or_else(|| ChainPushError::InvalidBatch("malformed public key point".into()))?;
    let hash = keccak256(tail);
    let tail_bytes = hash.get(12..32).ok_or_else(|| ChainPushError::InvalidBatch("hash too short".into()))?;
    let mut address = [0u8; 20];
    address.copy_from_slice(tail_bytes);
    Ok(address)
}

/// One merkle node in the validator tree: `(root, proof-by-address)`.
pub struct ValidatorMerkleTree {
    /// The tree's root hash.
    pub root: [u8; 32],
    leaves: Vec<([u8; 20], [u8; 32])>,
    layers: Vec<Vec<[u8; 32]>>,
}

impl ValidatorMerkleTree {
    /// Builds the merkle tree over `entries`, leaves ordered by ascending
    /// Ethereum address so the root is reproducible regardless of the
    /// caller's input order.
    pub fn build(domain_separator: &[u8; 32], entries: &[ValidatorEntry]) -> Self {
        let mut sorted: Vec<&ValidatorEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.eth_address.cmp(&b.eth_address));

        let leaves: Vec<([u8; 20], [u8; 32])> = sorted
            .iter()
            .map(|entry| {
                let bp = percent_to_bp(entry.voting_power_percentage);
                let mut preimage = Vec::with_capacity(32 + 20 + 4);
                preimage.extend_from_slice(domain_separator);
                preimage.extend_from_slice(&entry.eth_address);
                preimage.extend_from_slice(&bp.to_be_bytes());
                let leaf = keccak256(&preimage);
                (entry.eth_address, leaf.0)
            })
            .collect();

        if leaves.is_empty() {
            return Self { root: [0u8; 32], leaves, layers: vec![] };
        }

        let mut layers = vec![leaves.iter().map(|(_, h)| *h).collect::<Vec<_>>()];
        while layers.last().map(|l| l.len()).unwrap_or(0) > 1 {
            let Some(current) = layers.last().cloned() else {
                break;
            };
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                #[allow(clippy::indexing_slicing)]
                let left = current[i];
                #[allow(clippy::indexing_slicing)]
                let right = if i + 1 < current.len() { current[i + 1] } else { left };
                let mut preimage = Vec::with_capacity(64);
                preimage.extend_from_slice(&left);
                preimage.extend_from_slice(&right);
                next.push(keccak256(&preimage).0);
                i += 2;
            }
            layers.push(next);
        }

        #[allow(clippy::indexing_slicing)]
        let root = layers[layers.len() - 1][0];
        Self { root, leaves, layers }
    }

    /// Returns the merkle proof for `eth_address`, or `None` if it isn't in
    /// the tree.
    pub fn proof_for(&self, eth_address: &[u8; 20]) -> Option<Vec<[u8; 32]>> {
        let mut index = self.leaves.iter().position(|(addr, _)| addr == eth_address)?;
        let mut proof = Vec::new();
        for layer in self.layers.iter().take(self.layers.len().saturating_sub(1)) {
            let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
            if let Some(sibling) = layer.get(sibling_index) {
                proof.push(*sibling);
            } else if let Some(&self_hash) = layer.get(index) {
                proof.push(self_hash);
            }
            index /= 2;
        }
        Some(proof)
    }
}

/// Runs the full signature-processing pipeline:
/// recovers each signer, matches against the validator set, builds the merkle
/// tree, enforces the consensus threshold, and returns sorted bundles ready
/// for `postBatch`.
pub fn process_batch_signatures(batch: &Batch, domain_separator: &[u8; 32]) -> Result<Vec<SignatureBundle>, ChainPushError> {
    if batch.batch_id == [0u8; 32] || batch.validator_root == [0u8; 32] || batch.number_is_invalid() {
        return Err(ChainPushError::InvalidBatch("missing batch id, validator root, or batch number".into()));
    }
    if batch.signatures.is_empty() || batch.validator_entries.is_empty() {
        return Err(ChainPushError::InvalidBatch("batch has no signatures or no validator entries".into()));
    }

    let tree = ValidatorMerkleTree::build(domain_separator, &batch.validator_entries);

    let mut bundles = Vec::with_capacity(batch.signatures.len());
    let mut total_bp: u64 = 0;
    for sig in &batch.signatures {
        let recovered = recover_eth_address(&batch.batch_id, &sig.raw_signature)?;
        let entry = batch
            .validator_entries
            .iter()
            .find(|v| v.eth_address == recovered)
            .ok_or(ChainPushError::UnmatchedSignature)?;
        let proof = tree.proof_for(&entry.eth_address).unwrap_or_default();
        let bp = percent_to_bp(entry.voting_power_percentage);
        total_bp += bp as u64;
        bundles.push(SignatureBundle {
            proof,
            eth_address: entry.eth_address,
            voting_power_bp: bp,
            signature: sig.raw_signature,
        });
    }

    if total_bp < CONSENSUS_THRESHOLD_BP as u64 {
        return Err(ChainPushError::ConsensusNotReached { signed_percent: total_bp as f64 / 100.0 });
    }

    bundles.sort_by(|a, b| a.eth_address.cmp(&b.eth_address));
    Ok(bundles)
}

trait InvalidBatchNumber {
    fn number_is_invalid(&self) -> bool;
}
impl InvalidBatchNumber for Batch {
    fn number_is_invalid(&self) -> bool {
        self.batch_number == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey};
    use seda_bridge_types::model::BatchSignature;

    fn sign(signing_key: &SigningKey, message: &[u8; 32]) -> [u8; 65] {
        let (sig, recid): (K256Signature, RecoveryId) = signing_key.sign_prehash_recoverable(message).expect("sign");
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recid.to_byte() + 27;
        out
    }

    fn eth_address_of(signing_key: &SigningKey) -> [u8; 20] {
        let encoded = signing_key.verifying_key().to_encoded_point(false);
        #[allow(clippy::indexing_slicing)]
        let tail = &encoded.as_bytes()[1..];
        let hash = keccak256(tail);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..32]);
        address
    }

    #[test]
    fn recover_eth_address_matches_signer() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32].into()).expect("valid scalar");
        let message = [9u8; 32];
        let raw_sig = sign(&signing_key, &message);
        let recovered = recover_eth_address(&message, &raw_sig).expect("recovers");
        assert_eq!(recovered, eth_address_of(&signing_key));
    }

    #[test]
    fn merkle_root_is_order_independent() {
        let entries = vec![
            ValidatorEntry { validator_address: "a".into(), eth_address: [1u8; 20], voting_power_percentage: 40.0 },
            ValidatorEntry { validator_address: "b".into(), eth_address: [2u8; 20], voting_power_percentage: 60.0 },
        ];
        let mut reversed = entries.clone();
        reversed.reverse();

        let domain = [0u8; 32];
        let tree_a = ValidatorMerkleTree::build(&domain, &entries);
        let tree_b = ValidatorMerkleTree::build(&domain, &reversed);
        assert_eq!(tree_a.root, tree_b.root);
    }

    #[test]
    fn process_batch_signatures_rejects_below_quorum() {
        let signing_key = SigningKey::from_bytes(&[3u8; 32].into()).expect("valid scalar");
        let address = eth_address_of(&signing_key);
        let batch_id = [5u8; 32];
        let raw_sig = sign(&signing_key, &batch_id);

        let batch = Batch {
            batch_number: 1,
            batch_id,
            block_height: 1,
            data_result_root: [0u8; 32],
            validator_root: [1u8; 32],
            signatures: vec![BatchSignature {
                validator_address: "v1".into(),
                raw_signature: raw_sig,
                eth_address: address,
                voting_power_percentage: 60.0,
                merkle_proof: vec![],
            }],
            validator_entries: vec![
                ValidatorEntry { validator_address: "v1".into(), eth_address: address, voting_power_percentage: 60.0 },
                ValidatorEntry { validator_address: "v2".into(), eth_address: [9u8; 20], voting_power_percentage: 40.0 },
            ],
            data_request_ids: vec![],
        };

        let result = process_batch_signatures(&batch, &[0u8; 32]);
        assert!(matches!(result, Err(ChainPushError::ConsensusNotReached { .. })));
    }

    #[test]
    fn process_batch_signatures_succeeds_and_sorts_by_address() {
        let k1 = SigningKey::from_bytes(&[11u8; 32].into()).expect("valid scalar");
        let k2 = SigningKey::from_bytes(&[22u8; 32].into()).expect("valid scalar");
        let a1 = eth_address_of(&k1);
        let a2 = eth_address_of(&k2);
        let batch_id = [5u8; 32];

        let (first_addr, first_key) = if a1 < a2 { (a1, &k1) } else { (a2, &k2) };
        let _ = first_addr;
        let _ = first_key;

        let batch = Batch {
            batch_number: 1,
            batch_id,
            block_height: 1,
            data_result_root: [0u8; 32],
            validator_root: [1u8; 32],
            signatures: vec![
                BatchSignature {
                    validator_address: "v1".into(),
                    raw_signature: sign(&k1, &batch_id),
                    eth_address: a1,
                    voting_power_percentage: 70.0,
                    merkle_proof: vec![],
                },
                BatchSignature {
                    validator_address: "v2".into(),
                    raw_signature: sign(&k2, &batch_id),
                    eth_address: a2,
                    voting_power_percentage: 30.0,
                    merkle_proof: vec![],
                },
            ],
            validator_entries: vec![
                ValidatorEntry { validator_address: "v1".into(), eth_address: a1, voting_power_percentage: 70.0 },
                ValidatorEntry { validator_address: "v2".into(), eth_address: a2, voting_power_percentage: 30.0 },
            ],
            data_request_ids: vec![],
        };

        let bundles = process_batch_signatures(&batch, &[0u8; 32]).expect("quorum met");
        assert_eq!(bundles.len(), 2);
        assert!(bundles[0].eth_address <= bundles[1].eth_address, "sorted ascending by address");
    }
}
