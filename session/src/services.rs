//! Construction of the shared session services.

use std::sync::Arc;

use log::debug;

use crate::auth::{AuthApi, AuthOperations};
use crate::error::Error;
use crate::http::{ApiClient, ClientBuilder, Renewer};
use crate::navigation::Navigator;
use crate::token::TokenStore;

/// Everything built once at application start and shared by reference.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<TokenStore>,
    pub api: ApiClient,
    pub auth: AuthOperations,
}

impl Services {
    /// Wire the token store, both HTTP clients and the auth operations.
    ///
    /// Both clients share one reqwest client and therefore one cookie jar.
    pub fn build(builder: &ClientBuilder, navigator: Arc<dyn Navigator>) -> Result<Self, Error> {
        let base_url = builder.base_url()?;
        let inner = builder.build_inner()?;
        let store = Arc::new(TokenStore::new());

        let auth_api = Arc::new(AuthApi::new(
            builder.build_auth_client(inner.clone()),
            base_url.clone(),
            store.clone(),
        ));
        let renewer: Arc<dyn Renewer> = auth_api.clone();
        let api = builder.build_api_client(inner, store.clone(), renewer, navigator)?;
        let auth = AuthOperations::new(auth_api, api.clone(), store.clone());

        debug!("Session services ready for {base_url}");
        Ok(Self { store, api, auth })
    }
}
