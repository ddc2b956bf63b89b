//! Confirmation code generation

use bookline_domain::constants::{CONFIRMATION_CODE_ALPHABET, CONFIRMATION_CODE_LENGTH};
use rand::Rng;

/// Source of candidate confirmation codes. Uniqueness is enforced by the
/// store; callers regenerate on collision.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform random codes over the unambiguous alphabet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..CONFIRMATION_CODE_LENGTH)
            .map(|_| {
                let index = rng.gen_range(0..CONFIRMATION_CODE_ALPHABET.len());
                char::from(CONFIRMATION_CODE_ALPHABET[index])
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_only_unambiguous_characters() {
        let generator = RandomCodeGenerator;
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), CONFIRMATION_CODE_LENGTH);
            assert!(!code.contains(['0', 'O', '1', 'I']));
            assert!(code.bytes().all(|b| CONFIRMATION_CODE_ALPHABET.contains(&b)));
        }
    }
}
