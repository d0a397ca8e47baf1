//! Two-phase client bootstrap: extract a typed connection from an up-result,
//! then build the client from it.
//!
//! Each client declares the output shape it needs and how it bootstraps
//! itself, independently of when the up-result becomes available. A
//! deserializer is consumed by [`ConnectionDeserializer::deserialize`], so it
//! runs exactly once per environment.

use serde::de::DeserializeOwned;

use crate::application::ports::TransportFactory;
use crate::domain::config::ReadinessPolicy;
use crate::domain::{ClientInitError, DeserializeError, UpResult};

type ExtractFn<T> = Box<dyn FnOnce(&UpResult) -> Result<T, DeserializeError> + Send>;
type InitFn<A, T, C> = Box<dyn FnOnce(&A, T) -> anyhow::Result<C> + Send>;

/// Everything a client needs besides its connection info.
pub struct ClientContext<F: TransportFactory> {
    pub connector: F,
    pub readiness: ReadinessPolicy,
}

impl<F: TransportFactory> ClientContext<F> {
    pub fn new(connector: F, readiness: ReadinessPolicy) -> Self {
        Self {
            connector,
            readiness,
        }
    }
}

/// A client that can be bootstrapped from a stack output.
pub trait StackClient<F: TransportFactory>: Sized {
    type Connection: DeserializeOwned;

    /// Name of the output holding [`Self::Connection`].
    const OUTPUT: &'static str;

    /// # Errors
    ///
    /// See [`UpResult::output`].
    fn extract(up: &UpResult) -> Result<Self::Connection, DeserializeError> {
        up.output(Self::OUTPUT)
    }

    /// # Errors
    ///
    /// Returns an error if the transport cannot be opened.
    fn init(ctx: &ClientContext<F>, connection: Self::Connection) -> anyhow::Result<Self>;
}

/// Extraction plus initialisation, run once against an up-result.
pub struct ConnectionDeserializer<A, T, C> {
    extract: ExtractFn<T>,
    init: InitFn<A, T, C>,
}

impl<A, T, C> ConnectionDeserializer<A, T, C> {
    pub fn new(
        extract: impl FnOnce(&UpResult) -> Result<T, DeserializeError> + Send + 'static,
        init: impl FnOnce(&A, T) -> anyhow::Result<C> + Send + 'static,
    ) -> Self {
        Self {
            extract: Box::new(extract),
            init: Box::new(init),
        }
    }

    /// Extract the connection from `up`, then build the client.
    ///
    /// # Errors
    ///
    /// [`ClientInitError::Deserialize`] when extraction fails; `init` is not
    /// called in that case. [`ClientInitError::Init`] when `init` fails.
    pub fn deserialize(self, auth: &A, up: &UpResult) -> Result<C, ClientInitError> {
        let connection = (self.extract)(up)?;
        (self.init)(auth, connection).map_err(ClientInitError::Init)
    }
}

impl<F, C> ConnectionDeserializer<ClientContext<F>, C::Connection, C>
where
    F: TransportFactory + 'static,
    C: StackClient<F> + 'static,
{
    /// Deserializer using `C`'s own extraction and init.
    #[must_use]
    pub fn for_client() -> Self {
        Self::new(C::extract, C::init)
    }
}
