use crate::auth::{IdentityProvider, TokenService};
use crate::cli::CommandLineArgs;
use crate::resolver::{self, DatasetResolver};

use std::sync::Arc;
use std::time::Duration;

/// Shared application state passed to each request handler.
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Token service.
    pub token_service: TokenService,

    /// Dataset resolver.
    pub resolver: DatasetResolver,
}

impl AppState {
    /// Create and return an [AppState].
    ///
    /// Loads the alias table and canonicalises the data root; configuration errors are fatal at
    /// startup.
    pub fn new(
        args: &CommandLineArgs,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, std::io::Error> {
        let aliases = match &args.alias_file {
            Some(path) => resolver::load_alias_map(path)?,
            None => Default::default(),
        };
        let resolver = DatasetResolver::new(&args.data_root, aliases)?;
        let token_service = TokenService::new(
            provider,
            &args.jwt_secret,
            Duration::from_secs(args.token_lifetime),
            Duration::from_secs(args.token_leeway),
        );

        Ok(Self {
            args: args.clone(),
            token_service,
            resolver,
        })
    }
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
