//! Prompt builders for each scoring stage.

use openai::chat::{ChatCompletionMessage, ChatCompletionMessageRole};
use shared::openai_client::msg;

use crate::checklist::Checklist;

const REASON_TEMPLATE: &str = r#"
You are an OSCE examiner. For each checklist item below
write one short line (max 15 words) that states whether the student did it,
with a 0/3/5 *at the front*.

Example for score 5:
5  Greets patient warmly, introduces self

Example for score 3:
3  Asked about drug history but missed allergies

Example for score 0 (explain WHY it was absent, don't just say "absent"):
0  Did not ask about family health history at all
0  Failed to introduce self or establish rapport

Checklist:
{checklist}

Conversation (bullet summary):
{summary}

Student's stated diagnosis: {dx}

IMPORTANT: For items scored 0, give a specific reason WHY it was absent, don't just write "absent"

-----  WRITE {count} LINES, NOTHING ELSE  -----
"#;

const EXTRACTION_TEMPLATE: &str = r#"
Convert the examiner notes below into valid JSON that
conforms to this schema. Do not invent information.
{schema}

CHECKLIST ITEMS:
{checklist}

STUDENT DIAGNOSIS:
{dx}

NOTES
{notes}
"#;

const DIRECT_TEMPLATE: &str = r#"
You are an OSCE examiner scoring a medical student's clinical examination.

For each of the {count} checklist items, score the student's performance:
- 0 = Not done or absent
- 3 = Partially done
- 5 = Done well

Based on the brief transcript below, score ONLY what you see evidence for.
Most items will be scored 0 if the transcript is very short.

The output should be a JSON object with these fields:
- scores: Array of {count} integers (0, 3, or 5 only)
- item_comments: Array of {count} brief explanations
- comments: Overall assessment
- diagnosis_score: Integer from 0-5

TRANSCRIPT:
{transcript}

CHECKLIST ITEMS:
{checklist}

STUDENT DIAGNOSIS:
{dx}
"#;

const SINGLE_STAGE_SYSTEM: &str = "You are an OSCE examiner evaluating a medical student's performance.\n\
Score each checklist item on a scale of 0 (not done), 3 (partially done), or 5 (done well).\n\
Output JSON only, matching the provided schema.\n\
IMPORTANT: Only mark items as 0 (absent) if they are truly not addressed in the conversation.\n\
IMPORTANT: Give credit (score 3 or 5) for ANY attempt to address checklist items, even if brief.";

fn user(content: String) -> Vec<ChatCompletionMessage> {
    vec![msg(ChatCompletionMessageRole::User, &content)]
}

/// One-pass structured scoring of a very short, uncondensed transcript.
pub fn direct_scoring(transcript: &str, checklist: &Checklist, dx: &str) -> Vec<ChatCompletionMessage> {
    user(
        DIRECT_TEMPLATE
            .replace("{count}", &checklist.len().to_string())
            .replace("{checklist}", &checklist.as_json())
            .replace("{dx}", dx)
            .replace("{transcript}", transcript),
    )
}

/// Free-text examiner notes, one line per checklist item.
pub fn reasoning(summary: &str, checklist: &Checklist, dx: &str) -> Vec<ChatCompletionMessage> {
    user(
        REASON_TEMPLATE
            .replace("{count}", &checklist.len().to_string())
            .replace("{checklist}", &checklist.as_lines())
            .replace("{dx}", dx)
            .replace("{summary}", summary),
    )
}

/// Converts examiner notes into the structured schema.
pub fn extraction(
    notes: &str,
    checklist: &Checklist,
    dx: &str,
    schema: &str,
) -> Vec<ChatCompletionMessage> {
    user(
        EXTRACTION_TEMPLATE
            .replace("{schema}", schema)
            .replace("{checklist}", &checklist.as_json())
            .replace("{dx}", dx)
            .replace("{notes}", notes),
    )
}

/// Direct structured scoring of the condensed transcript, used when the
/// two-stage protocol fails.
pub fn single_stage(
    summary: &str,
    checklist: &Checklist,
    dx: &str,
    schema: &str,
) -> Vec<ChatCompletionMessage> {
    let content = format!(
        "Conversation:\n{summary}\n\nStudent diagnosis: {dx}\nChecklist items:\n{}\n\nSchema:\n{schema}",
        checklist.as_json()
    );
    vec![
        msg(ChatCompletionMessageRole::System, SINGLE_STAGE_SYSTEM),
        msg(ChatCompletionMessageRole::User, &content),
    ]
}
