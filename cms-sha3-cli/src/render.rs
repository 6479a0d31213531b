use cms_sha3::{SignatureReport, StateKind, VerificationReport};
use std::fmt::Write;

fn kind_label(kind: StateKind) -> &'static str {
    match kind {
        StateKind::Valid => "valid",
        StateKind::Invalid => "invalid",
        StateKind::Info => "info",
    }
}

fn line(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "    {label}: {value}");
}

/// Renders one signature report as grouped text.
pub(crate) fn render_signature(index: usize, report: &SignatureReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Signature #{}", index + 1);

    out.push_str("  Common\n");
    line(&mut out, "Signature type", &report.signature_type);
    if let Some(check_date) = &report.check_date {
        line(&mut out, "Check date", check_date.to_rfc3339());
    }
    if let Some(reason) = &report.reason {
        line(&mut out, "Reason", reason);
    }
    if let Some(location) = &report.location {
        line(&mut out, "Location", location);
    }

    if let Some(signer) = &report.signer_certificate {
        out.push_str("  Signer\n");
        line(&mut out, "Subject", &signer.subject);
        line(&mut out, "Issuer", &signer.issuer);
        line(&mut out, "Serial number", &signer.serial_number);
    }

    if let Some(signed_data) = &report.signed_data {
        out.push_str("  Algorithms\n");
        line(&mut out, "Digest", &signed_data.digest_algorithm);
        line(&mut out, "Signature", &signed_data.signature_algorithm);
        if let Some(curve) = &signed_data.named_curve {
            line(&mut out, "Named curve", curve);
        }
    }

    out.push_str("  States\n");
    for state in report.states() {
        let _ = writeln!(out, "    [{}] {state}", kind_label(state.kind));
    }
    out
}

pub(crate) fn render(report: &VerificationReport) -> String {
    if let Some(error) = &report.error {
        return format!("Error: {}\n", error.message);
    }
    if report.items.is_empty() {
        return "No signatures found\n".to_string();
    }
    report
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| render_signature(index, item))
        .collect::<Vec<_>>()
        .join("\n")
}
