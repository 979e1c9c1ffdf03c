//! Poseidon hash engine.
//!
//! Two-input Poseidon over BN254 with circom-compatible parameters. The
//! engine goes through one asynchronous build step before any tree can hash:
//! [`HashEngine::build`] constructs the permutation on a blocking worker and
//! checks it against a known output. Until then [`HashEngine::hasher`] fails
//! with [`HashError::NotInitialized`], and since [`Hasher`] has no public
//! constructor, no tree exists that could skip the check.

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher as _};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{FieldElement, HashError};

/// `Poseidon(0, 0)`, the level-1 zero hash.
pub const POSEIDON_ZERO_ZERO: &str =
    "2098f5fb9e239eab3ceac3f27b81e481dc3124d55ffed523a839ee8446b64864";

/// Builds and hands out Poseidon hashers.
#[derive(Debug, Default)]
pub struct HashEngine {
    ready: OnceCell<()>,
}

impl HashEngine {
    /// Create an engine that has not been built yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`build`](Self::build) has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Build the permutation and verify it. Calling this again after it has
    /// succeeded returns immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the permutation cannot be built, the
    /// self-check fails, or the blocking task dies.
    pub async fn build(&self) -> Result<(), HashError> {
        self.ready
            .get_or_try_init(|| async {
                tokio::task::spawn_blocking(|| {
                    let mut hasher = Hasher::new()?;
                    self_check(&mut hasher)
                })
                .await
                .map_err(|e| HashError::Build(e.to_string()))??;
                info!("poseidon hash engine ready");
                Ok::<_, HashError>(())
            })
            .await
            .map(|_| ())
    }

    /// A fresh hasher. Each tree owns one, so trees hash in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::NotInitialized`] before [`build`](Self::build)
    /// has completed.
    pub fn hasher(&self) -> Result<Hasher, HashError> {
        if !self.is_ready() {
            return Err(HashError::NotInitialized);
        }
        Hasher::new()
    }
}

fn self_check(hasher: &mut Hasher) -> Result<(), HashError> {
    let zero = FieldElement::zero();
    let actual = hasher.hash(&zero, &zero)?.to_hex();
    if actual != POSEIDON_ZERO_ZERO {
        return Err(HashError::SelfCheck {
            expected: POSEIDON_ZERO_ZERO.to_string(),
            actual,
        });
    }
    debug!("poseidon self-check passed");
    Ok(())
}

/// Two-to-one Poseidon compression. Argument order matters.
pub struct Hasher {
    poseidon: Poseidon<Fr>,
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl Hasher {
    pub(crate) fn new() -> Result<Self, HashError> {
        let poseidon =
            Poseidon::<Fr>::new_circom(2).map_err(|e| HashError::Poseidon(e.to_string()))?;
        Ok(Self {
            poseidon,
            #[cfg(test)]
            fail_after: None,
        })
    }

    /// Hash a left and a right child into their parent.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Poseidon`] if the permutation rejects its input.
    pub fn hash(
        &mut self,
        left: &FieldElement,
        right: &FieldElement,
    ) -> Result<FieldElement, HashError> {
        #[cfg(test)]
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                return Err(HashError::Poseidon("injected failure".to_string()));
            }
            *remaining -= 1;
        }

        let out = self
            .poseidon
            .hash(&[left.to_fr(), right.to_fr()])
            .map_err(|e| HashError::Poseidon(e.to_string()))?;
        Ok(FieldElement::from_fr(out))
    }
}

#[cfg(test)]
impl Hasher {
    /// Fail every hash after `hashes` more succeed; `None` clears it.
    pub(crate) fn fail_after(&mut self, hashes: Option<usize>) {
        self.fail_after = hashes;
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Hasher(poseidon-bn254-x5-2)")
    }
}
