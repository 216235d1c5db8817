/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::{collections::HashMap, fmt, sync::Arc};
use chrono::{DateTime,TimeDelta,Utc};
use dashmap::DashMap;
use reqwest::{Client,StatusCode};
use serde::{Serialize,Deserialize};
use tokio::sync::Mutex;
use tracing::{debug,info,warn};
use crate::{errors::{OdinFlightError,Result}, provider::{ProviderConfig,ProviderId}};

/// tokens are renewed this many seconds before the server declared expiration
pub const TOKEN_SAFETY_BUFFER_SECS: i64 = 60;

#[derive(Clone,Serialize,Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub(crate) client_secret: String,
}

impl ClientCredentials {
    pub fn new (client_id: impl ToString, client_secret: impl ToString)->Self {
        ClientCredentials { client_id: client_id.to_string(), client_secret: client_secret.to_string() }
    }
}

// never log secrets
impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "ClientCredentials( client_id: {}, client_secret: *** )", self.client_id)
    }
}

/// a bearer token. `renew_at` is the server declared expiration minus the safety buffer
#[derive(Debug,Clone)]
pub struct Credential {
    pub token: String,
    pub renew_at: DateTime<Utc>,
}

impl Credential {
    /// `expires_in_secs` comes from the server. Lifetimes that can't be represented are clamped, i.e. negative
    /// ones expire right away and huge ones never do
    pub fn new (token: String, issued: DateTime<Utc>, expires_in_secs: i64)->Self {
        let lifetime = expires_in_secs.saturating_sub( TOKEN_SAFETY_BUFFER_SECS).max(0);
        let renew_at = TimeDelta::try_seconds( lifetime)
            .and_then( |d| issued.checked_add_signed( d))
            .unwrap_or( DateTime::<Utc>::MAX_UTC);
        Credential { token, renew_at }
    }

    pub fn is_valid_at (&self, now: DateTime<Utc>)->bool { now < self.renew_at }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

type CredentialSlot = Arc<Mutex<Option<Credential>>>;

/// obtains and caches bearer tokens per provider.
/// Each provider has its own async mutex that is held across the token exchange, i.e. concurrent callers
/// wait for the in-flight exchange and then pick up its cached result instead of starting a second one
pub struct CredentialManager {
    client: Client,
    credentials: HashMap<ProviderId,ClientCredentials>,
    slots: DashMap<ProviderId,CredentialSlot>,
}

impl CredentialManager {
    pub fn new (client: Client, credentials: HashMap<ProviderId,ClientCredentials>)->Self {
        CredentialManager { client, credentials, slots: DashMap::new() }
    }

    pub fn has_credentials (&self, id: ProviderId)->bool { self.credentials.contains_key( &id) }

    fn slot (&self, id: ProviderId)->CredentialSlot {
        self.slots.entry( id).or_insert_with( || Arc::new( Mutex::new(None))).clone()
    }

    pub async fn acquire_token (&self, provider: &ProviderConfig)->Result<String> {
        let slot = self.slot( provider.id);
        let mut cached = slot.lock().await; // serializes exchanges for this provider

        if let Some(credential) = cached.as_ref() {
            if credential.is_valid_at( Utc::now()) {
                return Ok( credential.token.clone())
            }
            debug!("token for {} needs renewal", provider.id);
        }

        let credential = self.exchange_token( provider).await?;
        let token = credential.token.clone();
        *cached = Some(credential);
        Ok(token)
    }

    /// drop a cached token, e.g. after the provider rejected it
    pub async fn invalidate (&self, id: ProviderId) {
        if let Some(slot) = self.slots.get( &id).map( |e| e.value().clone()) {
            *slot.lock().await = None;
        }
    }

    async fn exchange_token (&self, provider: &ProviderConfig)->Result<Credential> {
        let Some(auth_url) = &provider.auth_url else {
            return Err( OdinFlightError::AuthError( format!("no token endpoint for {}", provider.id)))
        };
        let Some(creds) = self.credentials.get( &provider.id) else {
            return Err( OdinFlightError::AuthError( format!("missing credentials for {}", provider.id)))
        };

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str())
        ];

        let issued = Utc::now();
        let response = self.client.post( auth_url.as_str()).form( &params).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!("token exchange for {} failed with status {}", provider.id, status);
            return Err( OdinFlightError::AuthError( format!("invalid credentials for {} (status {})", provider.id, status.as_u16())))
        }

        let tr: TokenResponse = response.json().await?;
        info!("acquired token for {} (expires in {}s)", provider.id, tr.expires_in);
        Ok( Credential::new( tr.access_token, issued, tr.expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_validity() {
        let issued = Utc::now();
        let cred = Credential::new( "tok".to_string(), issued, 1800);

        assert!( cred.is_valid_at( issued));
        assert!( cred.is_valid_at( issued + TimeDelta::seconds(1739)));
        assert!( !cred.is_valid_at( issued + TimeDelta::seconds(1740)));
    }

    #[test]
    fn test_out_of_range_lifetimes() {
        let issued = Utc::now();

        let cred = Credential::new( "tok".to_string(), issued, 9_999_999_999_999_999);
        assert_eq!( cred.renew_at, DateTime::<Utc>::MAX_UTC);
        assert!( cred.is_valid_at( issued + TimeDelta::days(365)));

        let cred = Credential::new( "tok".to_string(), issued, i64::MAX);
        assert!( cred.is_valid_at( issued));

        let cred = Credential::new( "tok".to_string(), issued, i64::MIN);
        assert_eq!( cred.renew_at, issued);
        assert!( !cred.is_valid_at( issued));

        let cred = Credential::new( "tok".to_string(), issued, 30); // shorter than the safety buffer
        assert!( !cred.is_valid_at( issued));
    }

    #[test]
    fn test_secret_not_in_debug() {
        let creds = ClientCredentials::new( "me", "s3cret");
        let s = format!("{creds:?}");
        assert!( s.contains("me"));
        assert!( !s.contains("s3cret"));
    }
}
