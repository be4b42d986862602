//! Payroll, expense and income ledgers.
//!
//! A `Paid` payroll record and its expense entry are written in the same
//! store transaction, and leaving `Paid` removes the expense in the same
//! transaction as the status change.

use crate::calc::ValidationError;
use crate::model::{LedgerEntry, PayrollRecord, PayrollStatus, Teacher};
use crate::paths;
use crate::store::{DocumentStore, StoreError, WriteOp};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const PAYROLL_CATEGORY: &str = "Payroll";

#[derive(Debug, Error)]
pub enum FinanceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    Expense,
    Income,
}

impl LedgerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "expense" => Some(LedgerKind::Expense),
            "income" => Some(LedgerKind::Income),
            _ => None,
        }
    }

    fn collection(self) -> &'static str {
        match self {
            LedgerKind::Expense => paths::EXPENSES,
            LedgerKind::Income => paths::INCOME,
        }
    }
}

/// `YYYY-MM`.
pub fn parse_month(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").map_err(|_| {
        ValidationError::Invalid {
            field: "month",
            reason: "must be YYYY-MM".to_string(),
        }
    })
}

fn check_amount(amount: f64) -> Result<(), ValidationError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ValidationError::Invalid {
            field: "amount",
            reason: "must be a non-negative number".to_string(),
        });
    }
    Ok(())
}

pub fn validate_entry(entry: &LedgerEntry) -> Result<(), ValidationError> {
    if entry.title.trim().is_empty() {
        return Err(ValidationError::Required("title"));
    }
    check_amount(entry.amount)?;
    NaiveDate::parse_from_str(entry.date.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::Invalid {
            field: "date",
            reason: "must be YYYY-MM-DD".to_string(),
        }
    })?;
    Ok(())
}

pub fn add_entry(
    store: &mut DocumentStore,
    tenant_id: &str,
    kind: LedgerKind,
    mut entry: LedgerEntry,
) -> Result<String, FinanceError> {
    validate_entry(&entry)?;
    entry.title = entry.title.trim().to_string();
    if entry.category.trim().is_empty() {
        entry.category = "General".to_string();
    }
    let id = Uuid::new_v4().to_string();
    store.set_as(&paths::record(tenant_id, kind.collection(), &id)?, &entry)?;
    Ok(id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollChange {
    pub record: PayrollRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense: Option<LedgerEntry>,
}

pub fn set_payroll_status(
    store: &mut DocumentStore,
    tenant_id: &str,
    teacher_id: &str,
    month: &str,
    status: PayrollStatus,
    amount: Option<f64>,
    today: NaiveDate,
) -> Result<PayrollChange, FinanceError> {
    let month = month.trim();
    parse_month(month)?;
    let teacher: Teacher = store
        .get_as(&paths::record(tenant_id, paths::TEACHERS, teacher_id)?)?
        .ok_or(FinanceError::NotFound("teacher"))?;
    let payroll_path = paths::payroll(tenant_id, teacher_id, month)?;
    let existing: Option<PayrollRecord> = store.get_as(&payroll_path)?;

    let amount = amount
        .or_else(|| existing.as_ref().and_then(|r| r.amount))
        .or(teacher.salary)
        .ok_or(ValidationError::Required("amount"))?;
    check_amount(amount)?;

    let mut record = PayrollRecord {
        teacher_id: teacher_id.to_string(),
        month: month.to_string(),
        amount: Some(amount),
        status,
        expense_id: existing.and_then(|r| r.expense_id),
        updated_at: Some(chrono::Utc::now().to_rfc3339()),
    };

    let mut ops = Vec::new();
    let mut expense = None;
    if status == PayrollStatus::Paid {
        let expense_id = record
            .expense_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let expense_path = paths::record(tenant_id, paths::EXPENSES, &expense_id)?;
        let date = store
            .get_as::<LedgerEntry>(&expense_path)?
            .map(|e| e.date)
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        let entry = LedgerEntry {
            title: format!("Salary: {} ({})", teacher.name, month),
            category: PAYROLL_CATEGORY.to_string(),
            amount,
            date,
            payroll_ref: Some(paths::payroll_key(teacher_id, month)),
        };
        ops.push(WriteOp::Set(expense_path, to_value(&entry)?));
        record.expense_id = Some(expense_id);
        expense = Some(entry);
    } else if let Some(old) = record.expense_id.take() {
        ops.push(WriteOp::Remove(paths::record(tenant_id, paths::EXPENSES, &old)?));
    }
    ops.push(WriteOp::Set(payroll_path, to_value(&record)?));
    store.update(ops)?;

    info!(tenant_id, teacher_id, month, status = ?status, amount, "payroll status updated");
    Ok(PayrollChange { record, expense })
}

fn to_value<T: Serialize>(v: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(v).map_err(|source| StoreError::Decode {
        path: String::new(),
        source,
    })
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollCounts {
    pub paid: usize,
    pub pending: usize,
    pub suspended: usize,
    pub paid_amount: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    pub total_income: f64,
    pub total_expenses: f64,
    pub net: f64,
    pub income_by_category: BTreeMap<String, f64>,
    pub expenses_by_category: BTreeMap<String, f64>,
    pub payroll: PayrollCounts,
}

fn sum_entries(
    entries: &[(String, LedgerEntry)],
    month: Option<&str>,
) -> (f64, BTreeMap<String, f64>) {
    let mut total = 0.0;
    let mut by_category = BTreeMap::new();
    for (_, e) in entries {
        if month.map(|m| !e.date.starts_with(m)).unwrap_or(false) {
            continue;
        }
        total += e.amount;
        *by_category.entry(e.category.clone()).or_insert(0.0) += e.amount;
    }
    (total, by_category)
}

pub fn summarize(
    store: &DocumentStore,
    tenant_id: &str,
    month: Option<&str>,
) -> Result<FinanceSummary, FinanceError> {
    if let Some(m) = month {
        parse_month(m)?;
    }
    let income: Vec<(String, LedgerEntry)> =
        store.children_as(&paths::collection(tenant_id, paths::INCOME)?)?;
    let expenses: Vec<(String, LedgerEntry)> =
        store.children_as(&paths::collection(tenant_id, paths::EXPENSES)?)?;
    let payroll: Vec<(String, PayrollRecord)> =
        store.children_as(&paths::collection(tenant_id, paths::PAYROLL)?)?;

    let (total_income, income_by_category) = sum_entries(&income, month);
    let (total_expenses, expenses_by_category) = sum_entries(&expenses, month);

    let mut counts = PayrollCounts::default();
    for (_, r) in payroll
        .iter()
        .filter(|(_, r)| month.map(|m| r.month == m).unwrap_or(true))
    {
        match r.status {
            PayrollStatus::Paid => {
                counts.paid += 1;
                counts.paid_amount += r.amount.unwrap_or(0.0);
            }
            PayrollStatus::Pending => counts.pending += 1,
            PayrollStatus::Suspended => counts.suspended += 1,
        }
    }

    Ok(FinanceSummary {
        month: month.map(str::to_string),
        total_income,
        total_expenses,
        net: total_income - total_expenses,
        income_by_category,
        expenses_by_category,
        payroll: counts,
    })
}
