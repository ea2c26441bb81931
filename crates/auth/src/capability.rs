use serde::{Deserialize, Serialize};

use crate::RoleName;

/// An operation exposed at the boundary, gated by role.
///
/// Each capability lists the roles allowed to exercise it; the boundary asks
/// `authorize` before calling into the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewOwnAccount,
    Deposit,
    Withdraw,
    Transfer,
    ViewOwnTransactions,
    CreateAccount,
    ListPendingUsers,
    ApproveAccount,
    ListAccounts,
    FreezeAccount,
    ManageUsers,
    ResetPassword,
    AuditTransactions,
}

impl Capability {
    pub fn allowed_roles(&self) -> &'static [RoleName] {
        use Capability::*;
        match self {
            ViewOwnAccount | Deposit | Withdraw | Transfer | ViewOwnTransactions => {
                &[RoleName::Customer]
            }
            CreateAccount | ListPendingUsers | ApproveAccount | ListAccounts | FreezeAccount => {
                &[RoleName::Staff, RoleName::Admin]
            }
            ManageUsers | ResetPassword | AuditTransactions => &[RoleName::Admin],
        }
    }

    pub fn as_str(&self) -> &'static str {
        use Capability::*;
        match self {
            ViewOwnAccount => "account.view_own",
            Deposit => "account.deposit",
            Withdraw => "account.withdraw",
            Transfer => "account.transfer",
            ViewOwnTransactions => "account.transactions",
            CreateAccount => "account.create",
            ListPendingUsers => "staff.pending_users",
            ApproveAccount => "staff.approve",
            ListAccounts => "staff.accounts",
            FreezeAccount => "account.freeze",
            ManageUsers => "admin.users",
            ResetPassword => "admin.reset_password",
            AuditTransactions => "admin.audit",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
