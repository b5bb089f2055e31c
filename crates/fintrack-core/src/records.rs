// crates/fintrack-core/src/records.rs
// ============================================================================
// Module: Fintrack Records
// Description: Personal finance records and their validated write inputs.
// Purpose: Define what each table stores and how inputs become statements.
// Dependencies: serde, crate::{identifiers, mutation, validation}
// ============================================================================

//! ## Overview
//! Each table has a read model (for example [`Expense`]) and a write input
//! (for example [`NewExpense`]). Inputs implement [`RecordInput`], which
//! validates the input and renders it as column [`Field`] values that are
//! safe to replay on any store: no input carries a key generated by another
//! store except explicit foreign keys chosen by the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::RecordId;
use crate::identifiers::UserId;
use crate::mutation::Field;
use crate::mutation::Table;
use crate::validation;
use crate::validation::MAX_NAME_LENGTH;
use crate::validation::MAX_NOTE_LENGTH;
use crate::validation::ValidationError;

// ============================================================================
// SECTION: Input Trait
// ============================================================================

/// A validated write input for one table.
pub trait RecordInput {
    /// Table the input is written to.
    const TABLE: Table;

    /// Checks the input against domain rules.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when any field is invalid.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Renders the input as column values.
    fn fields(&self) -> Vec<Field>;

    /// Owning user, when the row is user-scoped.
    fn owner(&self) -> Option<UserId>;
}

// ============================================================================
// SECTION: Enumerations
// ============================================================================

/// Declares a text-backed enumeration with `as_str`, `Display`, and `FromStr`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($(#[$variant_meta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$variant_meta])* $variant),+
        }

        impl $name {
            /// Returns the stored text form.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ValidationError::UnknownVariant {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum! {
    /// Kind of money account.
    AccountType, "account_type" {
        /// Physical cash.
        Cash => "cash",
        /// Bank account.
        Bank => "bank",
        /// Credit card.
        CreditCard => "credit_card",
        /// Digital wallet.
        Wallet => "wallet",
        /// Anything else.
        Other => "other",
    }
}

text_enum! {
    /// Kind of investment holding.
    InvestmentType, "investment_type" {
        /// Listed stock.
        Stock => "stock",
        /// Mutual fund units.
        MutualFund => "mutual_fund",
        /// Cryptocurrency.
        Crypto => "crypto",
        /// Gold or bullion.
        Gold => "gold",
        /// Anything else.
        Other => "other",
    }
}

text_enum! {
    /// Interest compounding frequency of a fixed deposit.
    Compounding, "compounding" {
        /// Twelve times a year.
        Monthly => "monthly",
        /// Four times a year.
        Quarterly => "quarterly",
        /// Twice a year.
        HalfYearly => "half_yearly",
        /// Once a year.
        Yearly => "yearly",
    }
}

// ============================================================================
// SECTION: Users
// ============================================================================

/// Application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row id.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Opaque password hash produced by the authentication layer.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp (UTC, RFC 3339).
    pub created_at: String,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Unique login name.
    pub username: String,
    /// Opaque password hash.
    pub password_hash: String,
}

impl RecordInput for NewUser {
    const TABLE: Table = Table::Users;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::username(&self.username)?;
        validation::required_text("password_hash", &self.password_hash, 512)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("username", self.username.as_str()),
            Field::new("password_hash", self.password_hash.as_str()),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        None
    }
}

// ============================================================================
// SECTION: Categories
// ============================================================================

/// Expense category; `user_id` is `None` for built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Row id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Icon label used by the client.
    pub icon: String,
    /// Owning user, or `None` for defaults.
    pub user_id: Option<UserId>,
}

/// Input for creating or updating an expense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
    /// Icon label.
    pub icon: String,
    /// Owning user, or `None` for defaults.
    pub user_id: Option<UserId>,
}

impl RecordInput for NewCategory {
    const TABLE: Table = Table::Categories;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::required_text("name", &self.name, MAX_NAME_LENGTH)?;
        validation::bounded_text("icon", &self.icon, MAX_NAME_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("name", self.name.as_str()),
            Field::new("icon", self.icon.as_str()),
            Field::new("user_id", self.user_id),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }
}

/// Income category; `user_id` is `None` for built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeCategory {
    /// Row id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Icon label used by the client.
    pub icon: String,
    /// Owning user, or `None` for defaults.
    pub user_id: Option<UserId>,
}

/// Input for creating or updating an income category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncomeCategory {
    /// Display name.
    pub name: String,
    /// Icon label.
    pub icon: String,
    /// Owning user, or `None` for defaults.
    pub user_id: Option<UserId>,
}

impl RecordInput for NewIncomeCategory {
    const TABLE: Table = Table::IncomeCategories;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::required_text("name", &self.name, MAX_NAME_LENGTH)?;
        validation::bounded_text("icon", &self.icon, MAX_NAME_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("name", self.name.as_str()),
            Field::new("icon", self.icon.as_str()),
            Field::new("user_id", self.user_id),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }
}

// ============================================================================
// SECTION: Accounts
// ============================================================================

/// Money account owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Account kind.
    pub account_type: AccountType,
    /// Opening balance.
    pub balance: f64,
    /// Whether this is the user's default account.
    pub is_default: bool,
    /// Creation timestamp (UTC, RFC 3339).
    pub created_at: String,
}

/// Input for creating or updating an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Account kind.
    pub account_type: AccountType,
    /// Opening balance; may be negative for credit cards.
    pub balance: f64,
    /// Whether this is the user's default account.
    pub is_default: bool,
}

impl RecordInput for NewAccount {
    const TABLE: Table = Table::Accounts;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::required_text("name", &self.name, MAX_NAME_LENGTH)?;
        validation::finite("balance", self.balance)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id", self.user_id),
            Field::new("name", self.name.as_str()),
            Field::new("account_type", self.account_type.as_str()),
            Field::new("balance", self.balance),
            Field::new("is_default", self.is_default),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.user_id)
    }
}

// ============================================================================
// SECTION: Expenses & Incomes
// ============================================================================

/// Money spent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Amount spent.
    pub amount: f64,
    /// Date spent (`YYYY-MM-DD`).
    pub date: String,
    /// Expense category.
    pub category_id: RecordId,
    /// Merchant or place.
    pub where_spent: String,
    /// Free-form note.
    pub note: String,
    /// Account debited, if linked.
    pub account_id: Option<RecordId>,
    /// Creation timestamp (UTC, RFC 3339).
    pub created_at: String,
}

/// Input for creating or updating an expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    /// Owning user.
    pub user_id: UserId,
    /// Amount spent.
    pub amount: f64,
    /// Date spent (`YYYY-MM-DD`).
    pub date: String,
    /// Expense category.
    pub category_id: RecordId,
    /// Merchant or place.
    pub where_spent: String,
    /// Free-form note.
    pub note: String,
    /// Account debited, if linked.
    pub account_id: Option<RecordId>,
}

impl RecordInput for NewExpense {
    const TABLE: Table = Table::Expenses;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::positive_amount("amount", self.amount)?;
        validation::parse_date("date", &self.date)?;
        validation::bounded_text("where_spent", &self.where_spent, MAX_NAME_LENGTH)?;
        validation::bounded_text("note", &self.note, MAX_NOTE_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id", self.user_id),
            Field::new("amount", self.amount),
            Field::new("date", self.date.as_str()),
            Field::new("category_id", self.category_id),
            Field::new("where_spent", self.where_spent.as_str()),
            Field::new("note", self.note.as_str()),
            Field::new("account_id", self.account_id),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.user_id)
    }
}

/// Money received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Amount received.
    pub amount: f64,
    /// Date received (`YYYY-MM-DD`).
    pub date: String,
    /// Income category.
    pub category_id: RecordId,
    /// Payer or source.
    pub source: String,
    /// Free-form note.
    pub note: String,
    /// Account credited, if linked.
    pub account_id: Option<RecordId>,
    /// Creation timestamp (UTC, RFC 3339).
    pub created_at: String,
}

/// Input for creating or updating an income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncome {
    /// Owning user.
    pub user_id: UserId,
    /// Amount received.
    pub amount: f64,
    /// Date received (`YYYY-MM-DD`).
    pub date: String,
    /// Income category.
    pub category_id: RecordId,
    /// Payer or source.
    pub source: String,
    /// Free-form note.
    pub note: String,
    /// Account credited, if linked.
    pub account_id: Option<RecordId>,
}

impl RecordInput for NewIncome {
    const TABLE: Table = Table::Incomes;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::positive_amount("amount", self.amount)?;
        validation::parse_date("date", &self.date)?;
        validation::bounded_text("source", &self.source, MAX_NAME_LENGTH)?;
        validation::bounded_text("note", &self.note, MAX_NOTE_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id", self.user_id),
            Field::new("amount", self.amount),
            Field::new("date", self.date.as_str()),
            Field::new("category_id", self.category_id),
            Field::new("source", self.source.as_str()),
            Field::new("note", self.note.as_str()),
            Field::new("account_id", self.account_id),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.user_id)
    }
}

// ============================================================================
// SECTION: Investments
// ============================================================================

/// Investment holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Holding kind.
    pub investment_type: InvestmentType,
    /// Ticker or scheme code; empty when not applicable.
    pub symbol: String,
    /// Units held.
    pub units: f64,
    /// Total amount invested.
    pub invested_amount: f64,
    /// Last known market value.
    pub current_value: f64,
    /// Purchase date (`YYYY-MM-DD`).
    pub purchase_date: String,
    /// Free-form note.
    pub note: String,
}

/// Input for creating or updating an investment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvestment {
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Holding kind.
    pub investment_type: InvestmentType,
    /// Ticker or scheme code.
    pub symbol: String,
    /// Units held.
    pub units: f64,
    /// Total amount invested.
    pub invested_amount: f64,
    /// Last known market value.
    pub current_value: f64,
    /// Purchase date (`YYYY-MM-DD`).
    pub purchase_date: String,
    /// Free-form note.
    pub note: String,
}

impl RecordInput for NewInvestment {
    const TABLE: Table = Table::Investments;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::required_text("name", &self.name, MAX_NAME_LENGTH)?;
        validation::bounded_text("symbol", &self.symbol, 32)?;
        validation::non_negative("units", self.units)?;
        validation::positive_amount("invested_amount", self.invested_amount)?;
        validation::non_negative("current_value", self.current_value)?;
        validation::parse_date("purchase_date", &self.purchase_date)?;
        validation::bounded_text("note", &self.note, MAX_NOTE_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id", self.user_id),
            Field::new("name", self.name.as_str()),
            Field::new("investment_type", self.investment_type.as_str()),
            Field::new("symbol", self.symbol.as_str()),
            Field::new("units", self.units),
            Field::new("invested_amount", self.invested_amount),
            Field::new("current_value", self.current_value),
            Field::new("purchase_date", self.purchase_date.as_str()),
            Field::new("note", self.note.as_str()),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.user_id)
    }
}

// ============================================================================
// SECTION: Fixed Deposits
// ============================================================================

/// Bank fixed deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedDeposit {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Issuing bank.
    pub bank_name: String,
    /// Principal deposited.
    pub principal: f64,
    /// Annual interest rate in percent.
    pub interest_rate: f64,
    /// Start date (`YYYY-MM-DD`).
    pub start_date: String,
    /// Maturity date (`YYYY-MM-DD`).
    pub maturity_date: String,
    /// Compounding frequency.
    pub compounding: Compounding,
    /// Free-form note.
    pub note: String,
}

/// Input for creating or updating a fixed deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFixedDeposit {
    /// Owning user.
    pub user_id: UserId,
    /// Issuing bank.
    pub bank_name: String,
    /// Principal deposited.
    pub principal: f64,
    /// Annual interest rate in percent.
    pub interest_rate: f64,
    /// Start date (`YYYY-MM-DD`).
    pub start_date: String,
    /// Maturity date (`YYYY-MM-DD`).
    pub maturity_date: String,
    /// Compounding frequency.
    pub compounding: Compounding,
    /// Free-form note.
    pub note: String,
}

impl RecordInput for NewFixedDeposit {
    const TABLE: Table = Table::FixedDeposits;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::required_text("bank_name", &self.bank_name, MAX_NAME_LENGTH)?;
        validation::positive_amount("principal", self.principal)?;
        validation::non_negative("interest_rate", self.interest_rate)?;
        if self.interest_rate > 100.0 {
            return Err(ValidationError::OutOfRange {
                field: "interest_rate",
                detail: "must be at most 100 percent".to_string(),
            });
        }
        let start = validation::parse_date("start_date", &self.start_date)?;
        let maturity = validation::parse_date("maturity_date", &self.maturity_date)?;
        if maturity < start {
            return Err(ValidationError::OutOfRange {
                field: "maturity_date",
                detail: "must not precede start_date".to_string(),
            });
        }
        validation::bounded_text("note", &self.note, MAX_NOTE_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id", self.user_id),
            Field::new("bank_name", self.bank_name.as_str()),
            Field::new("principal", self.principal),
            Field::new("interest_rate", self.interest_rate),
            Field::new("start_date", self.start_date.as_str()),
            Field::new("maturity_date", self.maturity_date.as_str()),
            Field::new("compounding", self.compounding.as_str()),
            Field::new("note", self.note.as_str()),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.user_id)
    }
}

// ============================================================================
// SECTION: Provident Fund
// ============================================================================

/// Monthly provident-fund contribution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PfEntry {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Contribution date (`YYYY-MM-DD`).
    pub entry_date: String,
    /// Employee share.
    pub employee_contribution: f64,
    /// Employer share.
    pub employer_contribution: f64,
    /// Interest credited.
    pub interest: f64,
    /// Free-form note.
    pub note: String,
}

/// Input for creating or updating a provident-fund entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPfEntry {
    /// Owning user.
    pub user_id: UserId,
    /// Contribution date (`YYYY-MM-DD`).
    pub entry_date: String,
    /// Employee share.
    pub employee_contribution: f64,
    /// Employer share.
    pub employer_contribution: f64,
    /// Interest credited.
    pub interest: f64,
    /// Free-form note.
    pub note: String,
}

impl RecordInput for NewPfEntry {
    const TABLE: Table = Table::PfEntries;

    fn validate(&self) -> Result<(), ValidationError> {
        validation::parse_date("entry_date", &self.entry_date)?;
        validation::non_negative("employee_contribution", self.employee_contribution)?;
        validation::non_negative("employer_contribution", self.employer_contribution)?;
        validation::non_negative("interest", self.interest)?;
        validation::bounded_text("note", &self.note, MAX_NOTE_LENGTH)
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("user_id", self.user_id),
            Field::new("entry_date", self.entry_date.as_str()),
            Field::new("employee_contribution", self.employee_contribution),
            Field::new("employer_contribution", self.employer_contribution),
            Field::new("interest", self.interest),
            Field::new("note", self.note.as_str()),
        ]
    }

    fn owner(&self) -> Option<UserId> {
        Some(self.user_id)
    }
}
