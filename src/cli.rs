use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::interface::AccountOperations;
use crate::vault::accounts::{
    AccountQuery, AddAccountRequest, DeleteAccountsRequest, EditAccountRequest,
};
use crate::vault::{ApiVersion, ConfigValue, ConnectionConfig, Outcome, VaultError};

#[derive(Parser, Debug)]
#[command(
    name = "securden-bridge",
    about = "Manage Securden accounts from the command line",
    version
)]
pub struct Cli {
    /// Securden server URL, e.g. https://company.securden.com:5959
    #[arg(long, env = "SECURDEN_SERVER_URL", global = true, default_value = "")]
    pub server_url: String,

    /// Securden API authentication token.
    #[arg(long, env = "SECURDEN_AUTHTOKEN", global = true, default_value = "", hide_env_values = true)]
    pub authtoken: String,

    /// Absolute path to the server's PEM certificate.
    #[arg(long, env = "SECURDEN_CERTIFICATE", global = true)]
    pub certificate: Option<String>,

    /// Server API version ("1.0.0" for legacy servers).
    #[arg(long, env = "SECURDEN_API_VERSION", global = true, default_value = "current")]
    pub api_version: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Check that the server answers.
    Ping,
    /// Fetch a single account.
    GetAccount {
        #[arg(long)]
        account_id: Option<i64>,
        #[arg(long)]
        account_name: Option<String>,
        #[arg(long)]
        account_title: Option<String>,
        #[arg(long)]
        account_type: Option<String>,
        /// Return only this field.
        #[arg(long)]
        key_field: Option<String>,
    },
    /// Fetch several accounts by id.
    GetAccounts {
        #[arg(long = "account-ids", value_delimiter = ',', required = true)]
        account_ids: Vec<i64>,
    },
    /// Fetch passwords for several accounts (1.0.0 servers only).
    GetPasswords {
        #[arg(long = "account-ids", value_delimiter = ',', required = true)]
        account_ids: Vec<String>,
    },
    /// Create an account.
    AddAccount {
        #[arg(long)]
        account_title: String,
        #[arg(long)]
        account_type: String,
        #[arg(long)]
        account_name: Option<String>,
        #[arg(long)]
        ipaddress: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        personal_account: Option<bool>,
        #[arg(long)]
        folder_id: Option<i64>,
        #[arg(long)]
        password: Option<String>,
        /// DD/MM/YYYY
        #[arg(long)]
        account_expiration_date: Option<String>,
        #[arg(long)]
        distinguished_name: Option<String>,
        #[arg(long)]
        account_alias: Option<String>,
        #[arg(long)]
        domain_name: Option<String>,
    },
    /// Update an existing account.
    EditAccount {
        #[arg(long)]
        account_id: i64,
        #[arg(long)]
        account_title: Option<String>,
        #[arg(long)]
        account_name: Option<String>,
        #[arg(long)]
        account_type: Option<String>,
        #[arg(long)]
        ipaddress: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        personal_account: Option<bool>,
        #[arg(long)]
        folder_id: Option<i64>,
        #[arg(long)]
        overwrite_additional_fields: Option<bool>,
        #[arg(long)]
        account_expiration_date: Option<String>,
        #[arg(long)]
        distinguished_name: Option<String>,
        #[arg(long)]
        account_alias: Option<String>,
        #[arg(long)]
        domain_name: Option<String>,
    },
    /// Delete accounts by id.
    DeleteAccounts {
        #[arg(long = "account-ids", value_delimiter = ',', required = true)]
        account_ids: Vec<i64>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        delete_permanently: bool,
    },
}

impl Cli {
    /// Validates the global flags into a connection config.
    pub fn connection_config(&self) -> Result<ConnectionConfig, VaultError> {
        let api_version: ApiVersion = self.api_version.parse()?;
        Ok(
            ConnectionConfig::new(&self.server_url, &self.authtoken, self.certificate.as_deref())?
                .with_api_version(api_version),
        )
    }
}

/// What a command produced, ready for printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub status: i64,
    pub message: String,
    pub body: Value,
}

impl Report {
    fn from_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<Self> {
        Ok(Self {
            status: outcome.status,
            message: outcome.message,
            body: serde_json::to_value(outcome.record)?,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 0
    }

    /// The line shown to the user when the command failed.
    pub fn warning(&self) -> String {
        format!("{} - {}", self.status, self.message)
    }
}

fn value<T>(arg: &Option<T>) -> ConfigValue<T>
where
    T: Clone,
{
    ConfigValue::from_option(arg.clone())
}

/// Runs `command` against `ops`.
pub fn execute(ops: &dyn AccountOperations, command: &Commands) -> Result<Report> {
    let report = match command {
        Commands::Ping => {
            let reachable = ops.check_reachable();
            Report {
                status: if reachable { 200 } else { 503 },
                message: if reachable {
                    "Server is reachable".to_string()
                } else {
                    "Server is not reachable".to_string()
                },
                body: Value::Bool(reachable),
            }
        }
        Commands::GetAccount {
            account_id,
            account_name,
            account_title,
            account_type,
            key_field,
        } => {
            let query = AccountQuery {
                account_id: value(account_id),
                account_name: value(account_name),
                account_title: value(account_title),
                account_type: value(account_type),
                key_field: value(key_field),
            };
            Report::from_outcome(ops.get_account(&query))?
        }
        Commands::GetAccounts { account_ids } => {
            let ids: Vec<ConfigValue<i64>> =
                account_ids.iter().copied().map(ConfigValue::Known).collect();
            Report::from_outcome(ops.get_accounts(&ids))?
        }
        Commands::GetPasswords { account_ids } => {
            Report::from_outcome(ops.get_passwords(account_ids))?
        }
        Commands::AddAccount {
            account_title,
            account_type,
            account_name,
            ipaddress,
            notes,
            tags,
            personal_account,
            folder_id,
            password,
            account_expiration_date,
            distinguished_name,
            account_alias,
            domain_name,
        } => {
            let request = AddAccountRequest {
                account_title: ConfigValue::Known(account_title.clone()),
                account_type: ConfigValue::Known(account_type.clone()),
                account_name: value(account_name),
                ipaddress: value(ipaddress),
                notes: value(notes),
                tags: value(tags),
                personal_account: value(personal_account),
                folder_id: value(folder_id),
                password: value(password),
                account_expiration_date: value(account_expiration_date),
                distinguished_name: value(distinguished_name),
                account_alias: value(account_alias),
                domain_name: value(domain_name),
            };
            Report::from_outcome(ops.add_account(&request))?
        }
        Commands::EditAccount {
            account_id,
            account_title,
            account_name,
            account_type,
            ipaddress,
            notes,
            tags,
            personal_account,
            folder_id,
            overwrite_additional_fields,
            account_expiration_date,
            distinguished_name,
            account_alias,
            domain_name,
        } => {
            let request = EditAccountRequest {
                account_id: ConfigValue::Known(*account_id),
                account_title: value(account_title),
                account_name: value(account_name),
                account_type: value(account_type),
                ipaddress: value(ipaddress),
                notes: value(notes),
                tags: value(tags),
                personal_account: value(personal_account),
                folder_id: value(folder_id),
                overwrite_additional_fields: value(overwrite_additional_fields),
                account_expiration_date: value(account_expiration_date),
                distinguished_name: value(distinguished_name),
                account_alias: value(account_alias),
                domain_name: value(domain_name),
            };
            Report::from_outcome(ops.edit_account(&request))?
        }
        Commands::DeleteAccounts {
            account_ids,
            reason,
            delete_permanently,
        } => {
            let request = DeleteAccountsRequest {
                account_ids: account_ids.iter().copied().map(ConfigValue::Known).collect(),
                reason: value(reason),
                delete_permanently: ConfigValue::Known(*delete_permanently),
            };
            Report::from_outcome(ops.delete_accounts(&request))?
        }
    };

    if report.is_success() {
        info!("Command finished: {}", report.message);
    } else {
        error!("Command failed: {}", report.warning());
    }
    Ok(report)
}
