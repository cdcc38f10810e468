use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Verifies the `signature_key` carried by gateway notifications.
///
/// The gateway signs `order_id + status_code + gross_amount + server_key`
/// with SHA-512 and sends the lowercase hex digest.
pub struct SignatureVerifier {
    server_key: String,
}

impl SignatureVerifier {
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
        }
    }

    pub fn sign(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(self.server_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> bool {
        // An unconfigured key must never validate anything.
        if self.server_key.is_empty()
            || order_id.is_empty()
            || status_code.is_empty()
            || gross_amount.is_empty()
            || signature.is_empty()
        {
            return false;
        }

        let expected = self.sign(order_id, status_code, gross_amount);
        let supplied = signature.trim().to_ascii_lowercase();

        expected.as_bytes().ct_eq(supplied.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "SB-Mid-server-test-key";

    #[test]
    fn test_valid_signature_is_accepted() {
        let verifier = SignatureVerifier::new(KEY);
        let signature = verifier.sign("ORD-1001", "200", "150000.00");

        assert_eq!(signature.len(), 128); // 64 bytes = 128 hex chars
        assert!(verifier.verify("ORD-1001", "200", "150000.00", &signature));
        assert!(verifier.verify("ORD-1001", "200", "150000.00", &signature.to_uppercase()));
    }

    #[test]
    fn test_any_single_character_mutation_is_rejected() {
        let verifier = SignatureVerifier::new(KEY);
        let signature = verifier.sign("ORD-1001", "200", "150000.00");

        for i in 0..signature.len() {
            let mut bytes = signature.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(bytes).unwrap();
            assert!(
                !verifier.verify("ORD-1001", "200", "150000.00", &mutated),
                "mutation at {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_signature_is_bound_to_every_field() {
        let verifier = SignatureVerifier::new(KEY);
        let signature = verifier.sign("ORD-1001", "200", "150000.00");

        assert!(!verifier.verify("ORD-1002", "200", "150000.00", &signature));
        assert!(!verifier.verify("ORD-1001", "201", "150000.00", &signature));
        assert!(!verifier.verify("ORD-1001", "200", "150001.00", &signature));
        assert!(!SignatureVerifier::new("other-key").verify("ORD-1001", "200", "150000.00", &signature));
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let verifier = SignatureVerifier::new(KEY);
        let signature = verifier.sign("ORD-1001", "200", "150000.00");

        assert!(!verifier.verify("", "200", "150000.00", &signature));
        assert!(!verifier.verify("ORD-1001", "", "150000.00", &signature));
        assert!(!verifier.verify("ORD-1001", "200", "", &signature));
        assert!(!verifier.verify("ORD-1001", "200", "150000.00", ""));
        assert!(!verifier.verify("ORD-1001", "200", "150000.00", &signature[..64]));

        let unconfigured = SignatureVerifier::new("");
        let unkeyed = unconfigured.sign("ORD-1001", "200", "150000.00");
        assert!(!unconfigured.verify("ORD-1001", "200", "150000.00", &unkeyed));
    }
}
