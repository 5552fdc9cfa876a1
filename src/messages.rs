// src/messages.rs

use crate::activity::{ActivityCheckResult, ActivityStatus, RosterDiff};

/// Discord's per-message character limit
pub const MESSAGE_LIMIT: usize = 2000;

/// 1234567 -> "1,234,567"
pub fn format_xp(xp: i64) -> String {
    let digits = xp.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if xp < 0 {
        out.insert(0, '-');
    }
    out
}

fn result_line(result: &ActivityCheckResult) -> String {
    format!(
        "`{}` {} / {} xp ({})",
        result.username,
        format_xp(result.xp_gained),
        format_xp(result.xp_threshold),
        result.internal_role
    )
}

/// Activity report grouped by status. Expects results already sorted.
pub fn activity_report(results: &[ActivityCheckResult]) -> String {
    let in_status = |status: ActivityStatus| -> Vec<&ActivityCheckResult> {
        results.iter().filter(|r| r.status() == status).collect()
    };
    let danger = in_status(ActivityStatus::InDanger);
    let absent = in_status(ActivityStatus::Absent);
    let safe = in_status(ActivityStatus::Safe);
    let missing = in_status(ActivityStatus::NotInGroup);

    let mut report = format!(
        "**Activity check** ({} checked)\n\
        ⚠️ In danger: {} | ✅ Safe: {} | 🏖️ Absent: {}\n",
        results.len(),
        danger.len(),
        safe.len(),
        absent.len()
    );

    if !danger.is_empty() {
        report.push_str("\n**In danger**\n");
        for result in &danger {
            report.push_str(&result_line(result));
            report.push('\n');
        }
    }

    if !absent.is_empty() {
        report.push_str("\n**Absent**\n");
        for result in &absent {
            report.push_str(&format!("`{}`\n", result.username));
        }
    }

    if !missing.is_empty() {
        report.push_str("\n**Not in group**\n");
        for result in &missing {
            report.push_str(&format!("`{}`\n", result.username));
        }
    }

    if danger.is_empty() {
        report.push_str("\nEveryone met their requirement. 🎉\n");
    }

    report
}

/// Full results for the attached file
pub fn activity_csv(results: &[ActivityCheckResult]) -> String {
    let mut csv = String::from(
        "username,group_role,internal_role,xp_gained,xp_threshold,is_active,is_exempt,is_absent,is_prospect,skip_reason,status,last_progressed\n",
    );
    for r in results {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}\n",
            csv_field(&r.username),
            csv_field(&r.group_role),
            csv_field(&r.internal_role),
            r.xp_gained,
            r.xp_threshold,
            r.is_active,
            r.is_exempt,
            r.is_absent,
            r.is_prospect,
            r.skip_reason.map(|s| s.to_string()).unwrap_or_default(),
            r.status(),
            r.last_progressed.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ));
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// One member's verdict, for `/check_member`
pub fn member_check_message(result: &ActivityCheckResult) -> String {
    let mut message = format!("**{}**: {}\n", result.username, result.status());
    if result.status() != ActivityStatus::NotInGroup {
        message.push_str(&format!(
            "Gained {} of {} xp required ({})\n",
            format_xp(result.xp_gained),
            format_xp(result.xp_threshold),
            result.internal_role
        ));
    }
    if let Some(reason) = result.skip_reason {
        message.push_str(&format!("Skipped: {}\n", reason));
    }
    if let Some(last) = result.last_progressed {
        message.push_str(&format!("Last progressed <t:{}:R>\n", last.timestamp()));
    }
    message
}

/// Roster comparison with a header above each list
pub fn roster_report(diff: &RosterDiff) -> String {
    if diff.is_empty() {
        return "Discord and Wise Old Man rosters match. ✅".to_string();
    }

    let mut report = String::new();
    report.push_str(&format!(
        "**In Discord, not in the WOM group ({})**\n",
        diff.only_in_guild.len()
    ));
    for name in &diff.only_in_guild {
        report.push_str(&format!("- {}\n", name));
    }
    report.push_str(&format!(
        "\n**In the WOM group, not in Discord ({})**\n",
        diff.only_in_group.len()
    ));
    for name in &diff.only_in_group {
        report.push_str(&format!("- {}\n", name));
    }
    report
}

/// Split text into messages of at most `limit` characters, on line breaks where possible.
/// Chunks holding nothing but whitespace are dropped.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    // None until a line lands in it, so a blank line right after a flush is kept
    let mut current: Option<String> = None;

    for line in text.lines() {
        let mut line = line.to_string();

        while line.chars().count() > limit {
            chunks.extend(current.take());
            let split = line
                .char_indices()
                .nth(limit)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            let rest = line.split_off(split);
            chunks.push(line);
            line = rest;
        }

        current = match current.take() {
            Some(mut open) if open.chars().count() + 1 + line.chars().count() <= limit => {
                open.push('\n');
                open.push_str(&line);
                Some(open)
            }
            Some(full) => {
                chunks.push(full);
                Some(line)
            }
            None => Some(line),
        };
    }

    chunks.extend(current);
    chunks.retain(|c| !c.trim().is_empty());
    chunks
}
