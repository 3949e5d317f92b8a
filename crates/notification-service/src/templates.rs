use crate::{Alert, AssetMove};

const TABLE_STYLE: &str = "width:100%;border-collapse:collapse;margin:0 0 16px;";
const CELL_STYLE: &str = "padding:8px 12px;";

pub struct EmailTemplate;

impl EmailTemplate {
    /// HTML body: one block per triggered rule, then the safe-haven and
    /// risk-asset change tables.
    pub fn render(alert: &Alert) -> String {
        let rules_html: String = alert
            .rules
            .iter()
            .map(|rule| {
                format!(
                    r#"<div style="padding:12px 20px;border-bottom:1px solid #e2e8f0;">
  <p style="color:#b45309;font-weight:600;margin:0 0 6px;">&#9888; {warning}</p>
  <p style="color:#334155;margin:0;">{recommendation}</p>
</div>"#,
                    warning = escape(&rule.warning),
                    recommendation = escape(&rule.recommendation),
                )
            })
            .collect();

        let body_content = format!(
            r#"<div style="background:#1e293b;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">{title}</div>
{rules_html}
<div style="padding:16px 20px;">
  <h3 style="margin:0 0 8px;color:#0f172a;">Safe havens</h3>
  {safe}
  <h3 style="margin:0 0 8px;color:#0f172a;">Risk assets</h3>
  {risk}
</div>"#,
            title = escape(&alert.title),
            safe = change_table(&alert.safe_havens),
            risk = change_table(&alert.risk_assets),
        );

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">Sent at {ts} UTC</p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">Market Monitor</p>
  </td></tr>
</table>
</body>
</html>"#,
            ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }

    /// Plain-text body, also used for the alert log and webhook channels.
    pub fn render_text(alert: &Alert) -> String {
        let mut out = String::new();
        for rule in &alert.rules {
            out.push_str(&format!("WARNING: {}\n{}\n\n", rule.warning, rule.recommendation));
        }
        out.push_str("Safe havens:\n");
        for asset in &alert.safe_havens {
            out.push_str(&format!("  {}: {}\n", asset.name, format_change(asset.change_percent)));
        }
        out.push_str("Risk assets:\n");
        for asset in &alert.risk_assets {
            out.push_str(&format!("  {}: {}\n", asset.name, format_change(asset.change_percent)));
        }
        out
    }
}

/// `+1.25%` / `-0.40%`; `n/a` when the asset had no data.
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.2}%", c),
        None => "n/a".to_string(),
    }
}

fn change_table(assets: &[AssetMove]) -> String {
    let rows: String = assets
        .iter()
        .enumerate()
        .map(|(i, asset)| {
            let color = match asset.change_percent {
                Some(c) if c > 0.0 => "#16a34a",
                Some(c) if c < 0.0 => "#dc2626",
                _ => "#64748b",
            };
            let shade = if i % 2 == 1 { r#" style="background:#f8fafc;""# } else { "" };
            format!(
                r#"<tr{shade}><td style="{CELL_STYLE}color:#94a3b8;">{name}</td><td style="{CELL_STYLE}font-weight:600;color:{color};">{change}</td></tr>"#,
                name = escape(&asset.name),
                change = format_change(asset.change_percent),
            )
        })
        .collect();

    format!(
        r#"<table style="{TABLE_STYLE}"><tr><th align="left" style="{CELL_STYLE}">Asset</th><th align="left" style="{CELL_STYLE}">Change</th></tr>{rows}</table>"#
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
