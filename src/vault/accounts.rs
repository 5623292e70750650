//! Account operations exposed to the host.
//!
//! Every operation follows the same path: assemble a [`ParameterBag`], send
//! it through [`VaultClient::raise_request`], normalize the body and return an
//! [`Outcome`]. Errors never escape as `Err`; they come back as a status and a
//! message for the host to show as a warning.

use crate::vault::normalize::{
    flatten_multi, flatten_single, normalize, AccountRecord, AccountsRecord, Normalized,
    ResponseEnvelope, StatusRule,
};
use crate::vault::request::HttpMethod;
use crate::vault::{ApiVersion, ConfigValue, ParameterBag, VaultClient, VaultError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub use crate::vault::normalize::Outcome;

pub const GET_ACCOUNT_PATH: &str = "/secretsmanagement/get_account";
pub const GET_ACCOUNTS_PATH: &str = "/secretsmanagement/get_accounts";
pub const GET_PASSWORDS_PATH: &str = "/api/get_multiple_accounts_passwords";
pub const ADD_ACCOUNT_PATH: &str = "/api/add_account";
pub const EDIT_ACCOUNT_PATH: &str = "/api/edit_account";
pub const DELETE_ACCOUNTS_PATH: &str = "/api/delete_accounts";

/// Response key listing the ids removed by a delete.
const DELETED_IDS_KEY: &str = "IDs deleted successfully";

/// Lookup keys for a single account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountQuery {
    pub account_id: ConfigValue<i64>,
    pub account_name: ConfigValue<String>,
    pub account_title: ConfigValue<String>,
    pub account_type: ConfigValue<String>,
    /// Restricts the response to one field. Only sent to current servers.
    pub key_field: ConfigValue<String>,
}

impl AccountQuery {
    fn to_params(&self, api_version: ApiVersion) -> ParameterBag {
        let mut params = ParameterBag::new();
        // Zero is never a valid account id.
        if self.account_id.known().is_some_and(|id| *id != 0) {
            params.set("account_id", &self.account_id);
        }
        params
            .set("account_name", &self.account_name)
            .set("account_title", &self.account_title)
            .set("account_type", &self.account_type);
        if api_version == ApiVersion::Current {
            params.set("key_field", &self.key_field);
        }
        params
    }
}

/// Fixed field set returned by 1.0.0 servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountDetails {
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub account_title: Option<String>,
    pub account_type: Option<String>,
    pub password: Option<String>,
    pub key_field: Option<String>,
    pub key_value: Option<String>,
    pub private_key: Option<String>,
    pub putty_private_key: Option<String>,
    pub passphrase: Option<String>,
    pub ppk_passphrase: Option<String>,
    pub address: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub account_alias: Option<String>,
    pub account_file: Option<String>,
    pub oracle_sid: Option<String>,
    pub oracle_service_name: Option<String>,
    pub default_database: Option<String>,
    pub port: Option<String>,
}

impl AccountDetails {
    /// Picks the known fields out of a flattened record; anything else is dropped.
    pub fn from_record(record: &AccountRecord) -> Self {
        let field = |name: &str| record.get(name).map(str::to_string);
        Self {
            account_id: field("account_id"),
            account_name: field("account_name"),
            account_title: field("account_title"),
            account_type: field("account_type"),
            password: field("password"),
            key_field: field("key_field"),
            key_value: field("key_value"),
            private_key: field("private_key"),
            putty_private_key: field("putty_private_key"),
            passphrase: field("passphrase"),
            ppk_passphrase: field("ppk_passphrase"),
            address: field("address"),
            client_id: field("client_id"),
            client_secret: field("client_secret"),
            account_alias: field("account_alias"),
            account_file: field("account_file"),
            oracle_sid: field("oracle_sid"),
            oracle_service_name: field("oracle_service_name"),
            default_database: field("default_database"),
            port: field("port"),
        }
    }
}

/// Single-account result, shaped by the server's API version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AccountView {
    Dynamic(AccountRecord),
    Fixed(AccountDetails),
}

impl Default for AccountView {
    fn default() -> Self {
        AccountView::Dynamic(AccountRecord::default())
    }
}

/// Input for `add_account`. Title and type are required by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddAccountRequest {
    pub account_title: ConfigValue<String>,
    pub account_type: ConfigValue<String>,
    pub account_name: ConfigValue<String>,
    pub ipaddress: ConfigValue<String>,
    pub notes: ConfigValue<String>,
    pub tags: ConfigValue<String>,
    pub personal_account: ConfigValue<bool>,
    pub folder_id: ConfigValue<i64>,
    pub password: ConfigValue<String>,
    /// DD/MM/YYYY
    pub account_expiration_date: ConfigValue<String>,
    pub distinguished_name: ConfigValue<String>,
    pub account_alias: ConfigValue<String>,
    pub domain_name: ConfigValue<String>,
}

impl AddAccountRequest {
    pub fn to_params(&self) -> ParameterBag {
        let mut params = ParameterBag::new();
        params
            .set("account_name", &self.account_name)
            .set("account_title", &self.account_title)
            .set("account_type", &self.account_type)
            .set("ipaddress", &self.ipaddress)
            .set("notes", &self.notes)
            .set("tags", &self.tags)
            .set("personal_account", &self.personal_account)
            .set("folder_id", &self.folder_id)
            .set("password", &self.password)
            .set("account_expiration_date", &self.account_expiration_date)
            .set("distinguished_name", &self.distinguished_name)
            .set("account_alias", &self.account_alias)
            .set("domain_name", &self.domain_name);
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddAccountResult {
    pub id: i64,
    pub message: String,
}

/// Input for `edit_account`. Only `account_id` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditAccountRequest {
    pub account_id: ConfigValue<i64>,
    pub account_title: ConfigValue<String>,
    pub account_name: ConfigValue<String>,
    pub account_type: ConfigValue<String>,
    pub ipaddress: ConfigValue<String>,
    pub notes: ConfigValue<String>,
    pub tags: ConfigValue<String>,
    pub personal_account: ConfigValue<bool>,
    pub folder_id: ConfigValue<i64>,
    pub overwrite_additional_fields: ConfigValue<bool>,
    pub account_expiration_date: ConfigValue<String>,
    pub distinguished_name: ConfigValue<String>,
    pub account_alias: ConfigValue<String>,
    pub domain_name: ConfigValue<String>,
}

impl EditAccountRequest {
    pub fn to_params(&self) -> ParameterBag {
        let mut params = ParameterBag::new();
        params
            .set("account_id", &self.account_id)
            .set("account_title", &self.account_title)
            .set("account_name", &self.account_name)
            .set("account_type", &self.account_type)
            .set("ipaddress", &self.ipaddress)
            .set("notes", &self.notes)
            .set("tags", &self.tags)
            .set("personal_account", &self.personal_account)
            .set("folder_id", &self.folder_id)
            .set("overwrite_additional_fields", &self.overwrite_additional_fields)
            .set("account_expiration_date", &self.account_expiration_date)
            .set("distinguished_name", &self.distinguished_name)
            .set("account_alias", &self.account_alias)
            .set("domain_name", &self.domain_name);
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditAccountResult {
    pub message: String,
}

/// Input for `delete_accounts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteAccountsRequest {
    pub account_ids: Vec<ConfigValue<i64>>,
    pub reason: ConfigValue<String>,
    pub delete_permanently: ConfigValue<bool>,
}

impl DeleteAccountsRequest {
    pub fn to_params(&self) -> ParameterBag {
        let mut params = ParameterBag::new();
        params
            .set_ids("account_ids", &self.account_ids)
            .set("reason", &self.reason)
            .set_flag("delete_permanently", &self.delete_permanently);
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteAccountsResult {
    pub message: String,
    pub deleted_accounts: Vec<i64>,
}

impl VaultClient {
    /// Fetches one account, shaped according to the configured API version.
    pub fn get_account(&self, query: &AccountQuery) -> Outcome<AccountView> {
        match self.config().api_version() {
            ApiVersion::Current => {
                map_record(self.get_account_record(query), AccountView::Dynamic)
            }
            ApiVersion::Legacy => {
                map_record(self.get_account_details(query), AccountView::Fixed)
            }
        }
    }

    /// Dynamic account read: every response field, nested objects kept.
    pub fn get_account_record(&self, query: &AccountQuery) -> Outcome<AccountRecord> {
        let params = query.to_params(ApiVersion::Current);
        match self.call(&params, GET_ACCOUNT_PATH, HttpMethod::Get, StatusRule::Required) {
            Ok(ok) => Outcome::completed(flatten_single(&ok.body), ok.status, "Success"),
            Err(outcome) => outcome,
        }
    }

    /// Fixed-field account read used by 1.0.0 servers.
    pub fn get_account_details(&self, query: &AccountQuery) -> Outcome<AccountDetails> {
        let params = query.to_params(ApiVersion::Legacy);
        match self.call(&params, GET_ACCOUNT_PATH, HttpMethod::Get, StatusRule::Required) {
            Ok(ok) => {
                let record = flatten_single(&ok.body);
                let mut details = AccountDetails::from_record(&record);
                // Echo the lookup keys when the server leaves them out.
                if details.account_id.is_none() {
                    details.account_id = query.account_id.known().map(i64::to_string);
                }
                if details.account_name.is_none() {
                    details.account_name = query.account_name.known().cloned();
                }
                if details.account_title.is_none() {
                    details.account_title = query.account_title.known().cloned();
                }
                if details.account_type.is_none() {
                    details.account_type = query.account_type.known().cloned();
                }
                Outcome::completed(details, ok.status, "Success")
            }
            Err(outcome) => outcome,
        }
    }

    /// Fetches several accounts keyed by account id.
    pub fn get_accounts(&self, account_ids: &[ConfigValue<i64>]) -> Outcome<AccountsRecord> {
        let mut params = ParameterBag::new();
        params.set_ids("account_ids", account_ids);
        match self.call(&params, GET_ACCOUNTS_PATH, HttpMethod::Post, StatusRule::Implicit) {
            Ok(ok) => Outcome::completed(flatten_multi(&ok.body), ok.status, "Success"),
            Err(outcome) => outcome,
        }
    }

    /// Fetches passwords for several accounts. Only 1.0.0 servers offer this.
    pub fn get_passwords(&self, account_ids: &[String]) -> Outcome<BTreeMap<String, String>> {
        if self.config().api_version() != ApiVersion::Legacy {
            return Outcome::failed(410, "The feature is no more supported");
        }

        let mut ids = Vec::with_capacity(account_ids.len());
        for id in account_ids {
            match id.trim().parse::<i64>() {
                Ok(id) => ids.push(id),
                Err(e) => return Outcome::failed(400, format!("Invalid account ID format: {}", e)),
            }
        }

        let mut params = ParameterBag::new();
        params.insert("account_ids", ids);
        match self.call(&params, GET_PASSWORDS_PATH, HttpMethod::Post, StatusRule::Required) {
            Ok(ok) => {
                let passwords: BTreeMap<String, String> = ok
                    .body
                    .get("passwords")
                    .and_then(Value::as_object)
                    .map(|map| {
                        map.iter()
                            .filter_map(|(id, pw)| Some((id.clone(), pw.as_str()?.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();
                Outcome::completed(passwords, ok.status, "Success")
            }
            Err(outcome) => outcome,
        }
    }

    /// Creates an account and returns its new id.
    pub fn add_account(&self, request: &AddAccountRequest) -> Outcome<AddAccountResult> {
        let params = request.to_params();
        match self.call(&params, ADD_ACCOUNT_PATH, HttpMethod::Post, StatusRule::ZeroIsSuccess) {
            Ok(ok) => {
                let message = ok.message().unwrap_or_default().to_string();
                let id = ok.body.get("ID").and_then(id_number).unwrap_or_default();
                Outcome::completed(
                    AddAccountResult {
                        id,
                        message: message.clone(),
                    },
                    ok.status,
                    message,
                )
            }
            Err(outcome) => outcome,
        }
    }

    /// Updates an existing account.
    pub fn edit_account(&self, request: &EditAccountRequest) -> Outcome<EditAccountResult> {
        let params = request.to_params();
        match self.call(&params, EDIT_ACCOUNT_PATH, HttpMethod::Put, StatusRule::ZeroIsSuccess) {
            Ok(ok) => {
                let message = ok.message().unwrap_or_default().to_string();
                Outcome::completed(
                    EditAccountResult {
                        message: message.clone(),
                    },
                    ok.status,
                    message,
                )
            }
            Err(outcome) => outcome,
        }
    }

    /// Deletes accounts and reports which ids the server removed.
    pub fn delete_accounts(
        &self,
        request: &DeleteAccountsRequest,
    ) -> Outcome<DeleteAccountsResult> {
        let params = request.to_params();
        match self.call(&params, DELETE_ACCOUNTS_PATH, HttpMethod::Delete, StatusRule::Implicit) {
            Ok(ok) => {
                let message = ok.message().unwrap_or_default().to_string();
                let deleted_accounts: Vec<i64> = ok
                    .body
                    .get(DELETED_IDS_KEY)
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(id_number).collect())
                    .unwrap_or_default();
                Outcome::completed(
                    DeleteAccountsResult {
                        message: message.clone(),
                        deleted_accounts,
                    },
                    ok.status,
                    message,
                )
            }
            Err(outcome) => outcome,
        }
    }

    /// Sends the request and normalizes the envelope. Failures are already
    /// turned into an [`Outcome`] carrying the default record.
    fn call<T: Default>(
        &self,
        params: &ParameterBag,
        path: &str,
        method: HttpMethod,
        rule: StatusRule,
    ) -> Result<Normalized, Outcome<T>> {
        let raw = self.raise_request(params, path, method).map_err(api_error)?;
        normalize(&raw, rule).map_err(|failure| {
            let envelope = serde_json::from_slice::<Value>(&raw)
                .map(|body| ResponseEnvelope::from_body(&body))
                .unwrap_or_default();
            warn!(
                "{} {} failed with {}: {} (error code: {})",
                method,
                path,
                failure.status,
                failure.message,
                envelope
                    .error
                    .and_then(|e| e.code)
                    .unwrap_or_else(|| "none".to_string())
            );
            failure.into_outcome()
        })
    }
}

fn api_error<T: Default>(err: VaultError) -> Outcome<T> {
    debug!("API call failed: {}", err);
    Outcome::failed(500, format!("Error in API call: {}", err))
}

fn map_record<T, U>(outcome: Outcome<T>, f: impl FnOnce(T) -> U) -> Outcome<U> {
    Outcome {
        record: f(outcome.record),
        status: outcome.status,
        message: outcome.message,
    }
}

fn id_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
}
