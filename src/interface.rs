use crate::vault::accounts::{
    AccountQuery, AccountView, AddAccountRequest, AddAccountResult, DeleteAccountsRequest,
    DeleteAccountsResult, EditAccountRequest, EditAccountResult,
};
use crate::vault::normalize::AccountsRecord;
use crate::vault::{ConfigValue, Outcome, VaultClient};
use std::collections::BTreeMap;

/// Account operations the host layer relies on.
///
/// Implemented by [`VaultClient`]; hosts and tests can substitute their own.
pub trait AccountOperations {
    /// Check whether the server answers at all
    fn check_reachable(&self) -> bool;

    fn get_account(&self, query: &AccountQuery) -> Outcome<AccountView>;

    fn get_accounts(&self, account_ids: &[ConfigValue<i64>]) -> Outcome<AccountsRecord>;

    fn get_passwords(&self, account_ids: &[String]) -> Outcome<BTreeMap<String, String>>;

    fn add_account(&self, request: &AddAccountRequest) -> Outcome<AddAccountResult>;

    fn edit_account(&self, request: &EditAccountRequest) -> Outcome<EditAccountResult>;

    fn delete_accounts(&self, request: &DeleteAccountsRequest) -> Outcome<DeleteAccountsResult>;
}

impl AccountOperations for VaultClient {
    fn check_reachable(&self) -> bool {
        VaultClient::check_reachable(self)
    }

    fn get_account(&self, query: &AccountQuery) -> Outcome<AccountView> {
        VaultClient::get_account(self, query)
    }

    fn get_accounts(&self, account_ids: &[ConfigValue<i64>]) -> Outcome<AccountsRecord> {
        VaultClient::get_accounts(self, account_ids)
    }

    fn get_passwords(&self, account_ids: &[String]) -> Outcome<BTreeMap<String, String>> {
        VaultClient::get_passwords(self, account_ids)
    }

    fn add_account(&self, request: &AddAccountRequest) -> Outcome<AddAccountResult> {
        VaultClient::add_account(self, request)
    }

    fn edit_account(&self, request: &EditAccountRequest) -> Outcome<EditAccountResult> {
        VaultClient::edit_account(self, request)
    }

    fn delete_accounts(&self, request: &DeleteAccountsRequest) -> Outcome<DeleteAccountsResult> {
        VaultClient::delete_accounts(self, request)
    }
}
