//! # Structured-clone engines.
//!
//! The [`StructuredClone`] trait is the seam where a host plugs its own
//! serializer/deserializer pair. The crate ships one engine, [`WireClone`],
//! a versioned header over postcard. Its layout is an implementation detail:
//! the only contract is that its output round-trips through itself.
//!
//! ## Contract
//! - Engines are stateless and reentrant; one instance is shared by every
//!   context of a host without locking.
//! - `serialize` fails only with [`CloneError::Serialization`].
//! - `deserialize` fails only with [`CloneError::Deserialization`].

mod wire;

pub(crate) use wire::DEFAULT_MAX_DEPTH;
pub use wire::WireClone;

use crate::error::CloneError;
use crate::value::Value;

/// A structured-clone serializer/deserializer pair.
pub trait StructuredClone: Send + Sync + 'static {
    /// Encodes a value into its byte form.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CloneError>;

    /// Decodes bytes produced by [`serialize`](Self::serialize).
    fn deserialize(&self, bytes: &[u8]) -> Result<Value, CloneError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
