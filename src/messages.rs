//! Message templates for outbound notifications and receipts.

use crate::core::date_parser::LineOutcome;
use crate::models::Task;

pub fn daily_review_header(is_makeup: bool) -> &'static str {
    if is_makeup {
        "🧾 日终核对（含昨日未清）："
    } else {
        "🧾 日终核对（今天应完成）："
    }
}

/// "• #12 备份 NAS 配置"
pub fn format_task_item(task: &Task) -> String {
    format!("• #{} {}", task.id, task.content)
}

pub fn new_plan_prompt() -> &'static str {
    "要不要录入「明天 + 一周内」的新计划？"
}

pub fn morning_header() -> &'static str {
    "🌅 今日待办："
}

pub fn digest_text(tasks: &[Task]) -> String {
    let mut lines = vec![morning_header().to_string()];
    lines.extend(tasks.iter().map(format_task_item));
    lines.join("\n")
}

pub fn makeup_text(tasks: &[Task]) -> String {
    let mut lines = vec![daily_review_header(true).to_string()];
    lines.extend(tasks.iter().map(format_task_item));
    lines.join("\n")
}

pub fn input_mode_instructions() -> &'static str {
    "请发送多行文本，每行=1 个任务。\n\
     行内可写日期：今天/明天/后天/周三/下周一/11-15/2025-11-15/+2d/+1w。\n\
     未写日期默认归档到「明天」。"
}

/// Receipt for one multi-line submission: created lines with their
/// resolved dates, then one line per parse failure. Failed lines are
/// reported, never silently dropped.
pub fn creation_receipt(outcomes: &[LineOutcome]) -> String {
    let created = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let mut lines = vec![format!("已创建 {} 项：", created)];

    for outcome in outcomes {
        match &outcome.result {
            Ok(parsed) => {
                lines.push(format!("• {}  →  {}", parsed.content, parsed.due_date));
            }
            Err(_) => {
                lines.push(format!("• 第 {} 行无法识别，已跳过", outcome.line_no));
            }
        }
    }

    lines.join("\n")
}
