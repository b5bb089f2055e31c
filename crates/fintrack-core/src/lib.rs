// crates/fintrack-core/src/lib.rs
// ============================================================================
// Module: Fintrack Core Library
// Description: Public API surface for the Fintrack domain core.
// Purpose: Expose records, identifiers, validation, and the mutation model.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Fintrack core defines the personal finance records (expenses, incomes,
//! accounts, investments, fixed deposits, provident-fund entries) and the
//! [`Mutation`] command model used to replay one logical write against every
//! store in a replica set. It is backend-agnostic: storage crates interpret
//! [`Statement`] values against their own engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identifiers;
pub mod mutation;
pub mod records;
pub mod validation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::RecordId;
pub use identifiers::UserId;
pub use mutation::Field;
pub use mutation::Filter;
pub use mutation::Mutation;
pub use mutation::MutationResult;
pub use mutation::SqlValue;
pub use mutation::Statement;
pub use mutation::Table;
pub use records::Account;
pub use records::AccountType;
pub use records::Category;
pub use records::Compounding;
pub use records::Expense;
pub use records::FixedDeposit;
pub use records::Income;
pub use records::IncomeCategory;
pub use records::Investment;
pub use records::InvestmentType;
pub use records::NewAccount;
pub use records::NewCategory;
pub use records::NewExpense;
pub use records::NewFixedDeposit;
pub use records::NewIncome;
pub use records::NewIncomeCategory;
pub use records::NewInvestment;
pub use records::NewPfEntry;
pub use records::NewUser;
pub use records::PfEntry;
pub use records::RecordInput;
pub use records::User;
pub use validation::ValidationError;
