//! Print-ready contract sheet.
//!
//! Serves a self-contained HTML document carrying the contract fields
//! and the uppercase Chinese rendering of the amount. Printing to PDF
//! is left to the browser.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Extension;
use uuid::Uuid;

use pactum_core::{to_chinese_amount, Actor, Contract, ContractStatus, User};
use pactum_storage::apply;

use super::error::ApiError;
use super::state::AppState;

/// GET /api/contracts/{id}/export
pub(crate) async fn handle_export_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
) -> Result<Html<String>, ApiError> {
    let actor = Actor::from(&user);
    let record = apply::fetch_contract(&state.store, contract_id, &actor).await?;
    Ok(Html(render_sheet(&record.contract)))
}

fn status_label(status: ContractStatus) -> &'static str {
    match status {
        ContractStatus::Draft => "草稿",
        ContractStatus::PendingFinance => "待财务审核",
        ContractStatus::FinanceApproved => "财务已审核",
        ContractStatus::Active => "生效中",
        ContractStatus::Rejected => "已驳回",
        ContractStatus::Expired => "已过期",
        ContractStatus::Terminated => "已终止",
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn render_sheet(contract: &Contract) -> String {
    // Stored contracts always carry a formattable amount; fall back to
    // plain digits if not.
    let uppercase = to_chinese_amount(contract.amount)
        .unwrap_or_else(|_| contract.amount.to_string());
    let sign_date = contract
        .sign_date
        .map(|d| d.to_string())
        .unwrap_or_default();
    let expire_date = contract
        .expire_date
        .map(|d| d.to_string())
        .unwrap_or_default();
    let note = contract.note.as_deref().unwrap_or("");

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body {{ font-family: "Songti SC", "SimSun", serif; margin: 2.5cm; }}
  h1 {{ text-align: center; font-size: 22px; }}
  table {{ width: 100%; border-collapse: collapse; margin-top: 1.5em; }}
  th, td {{ border: 1px solid #333; padding: 10px 14px; font-size: 14px; }}
  th {{ width: 9em; text-align: left; background: #f5f5f5; font-weight: normal; }}
  .footer {{ margin-top: 3em; font-size: 12px; color: #666; }}
  @media print {{ .footer {{ display: none; }} }}
</style>
</head>
<body>
<h1>{title}</h1>
<table>
  <tr><th>合同编号</th><td>{contract_no}</td></tr>
  <tr><th>甲方</th><td>{party_a}</td></tr>
  <tr><th>乙方</th><td>{party_b}</td></tr>
  <tr><th>合同金额</th><td>{amount} 元</td></tr>
  <tr><th>金额大写</th><td>{uppercase}</td></tr>
  <tr><th>签订日期</th><td>{sign_date}</td></tr>
  <tr><th>到期日期</th><td>{expire_date}</td></tr>
  <tr><th>状态</th><td>{status}</td></tr>
  <tr><th>备注</th><td>{note}</td></tr>
</table>
<div class="footer">编号 {id}</div>
</body>
</html>
"#,
        title = escape_html(&contract.title),
        contract_no = escape_html(&contract.contract_no),
        party_a = escape_html(&contract.party_a),
        party_b = escape_html(&contract.party_b),
        amount = contract.amount,
        uppercase = uppercase,
        sign_date = sign_date,
        expire_date = expire_date,
        status = status_label(contract.status),
        note = escape_html(note),
        id = contract.id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    fn sheet_contract() -> Contract {
        let now = OffsetDateTime::now_utc();
        Contract {
            id: Uuid::new_v4(),
            title: "设备采购合同".to_string(),
            contract_no: "HT-2024-001".to_string(),
            party_a: "甲方公司".to_string(),
            party_b: "乙方 <b>公司</b>".to_string(),
            amount: Decimal::new(123_456, 2),
            sign_date: None,
            expire_date: None,
            status: ContractStatus::Active,
            note: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sheet_carries_uppercase_amount_and_status_label() {
        let html = render_sheet(&sheet_contract());
        assert!(html.contains("壹仟贰佰叁拾肆元伍角陆分"));
        assert!(html.contains("生效中"));
        assert!(html.contains("HT-2024-001"));
    }

    #[test]
    fn field_content_is_escaped() {
        let html = render_sheet(&sheet_contract());
        assert!(html.contains("乙方 &lt;b&gt;公司&lt;/b&gt;"));
        assert!(!html.contains("<b>公司</b>"));
    }
}
