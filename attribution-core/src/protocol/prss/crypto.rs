use aes::{
    Aes256,
    cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};

// The key exchange component of a party.
pub struct KeyExchange {
    sk: EphemeralSecret,
}

impl KeyExchange {
    pub fn new<R: RngCore + CryptoRng>(r: &mut R) -> Self {
        Self {
            sk: EphemeralSecret::random_from_rng(r),
        }
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.sk)
    }

    #[must_use]
    pub fn key_exchange(self, pk: &PublicKey) -> GeneratorFactory {
        debug_assert_ne!(pk, &self.public_key(), "self key exchange detected");
        let secret = self.sk.diffie_hellman(pk);
        let kdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
        GeneratorFactory { kdf }
    }
}

/// This intermediate object exists so that multiple generators can be constructed,
/// with each one dedicated to one purpose.
pub struct GeneratorFactory {
    kdf: Hkdf<Sha256>,
}

impl GeneratorFactory {
    /// Create a new generator using the provided context string.
    #[allow(clippy::missing_panics_doc)] // Panic should be impossible.
    #[must_use]
    pub fn generator(&self, context: &[u8]) -> Generator {
        let mut k = GenericArray::default();
        self.kdf.expand(context, &mut k).unwrap();
        Generator {
            cipher: Aes256::new(&k),
        }
    }
}

/// The basic generator. This generates values based on an arbitrary index.
#[derive(Debug, Clone)]
pub struct Generator {
    cipher: Aes256,
}

impl Generator {
    /// Generate the value at the given index.
    /// This uses the MMO^{\pi} function described in <https://eprint.iacr.org/2019/074>.
    #[must_use]
    pub fn generate(&self, index: u128) -> u128 {
        let mut buf = index.to_le_bytes();
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(&mut buf));

        u128::from_le_bytes(buf) ^ index
    }
}

#[cfg(all(test, unit_test))]
mod tests {
    use rand::thread_rng;

    use super::KeyExchange;

    #[test]
    fn both_sides_derive_the_same_generator() {
        let mut rng = thread_rng();
        let publisher = KeyExchange::new(&mut rng);
        let partner = KeyExchange::new(&mut rng);
        let (publisher_pk, partner_pk) = (publisher.public_key(), partner.public_key());

        let g1 = publisher.key_exchange(&partner_pk).generator(b"test");
        let g2 = partner.key_exchange(&publisher_pk).generator(b"test");
        assert_eq!(g1.generate(7), g2.generate(7));
        assert_ne!(g1.generate(7), g1.generate(8));
    }

    #[test]
    fn contexts_are_independent() {
        let mut rng = thread_rng();
        let publisher = KeyExchange::new(&mut rng);
        let partner = KeyExchange::new(&mut rng);
        let factory = publisher.key_exchange(&partner.public_key());
        assert_ne!(
            factory.generator(b"a").generate(0),
            factory.generator(b"b").generate(0)
        );
    }
}
