// All prompt constants for the analysis pipeline.
// Templates carry `{placeholder}` slots filled by the builders at the bottom of this file.
// Output must stay deterministic: same inputs, same PromptSections.

use crate::analysis::refinement::{ConversationLog, REFUSAL_MESSAGE};
use crate::llm_client::PromptSections;

pub const RESUME_ANALYSIS_SYSTEM: &str =
    "You are a resume analyzer. Extract the following from the resume you are given:\n\
    - Profile Summary\n\
    - Key Skills\n\
    - Work Experiences";

/// Replace `{resume_text}` before sending.
pub const RESUME_ANALYSIS_TEMPLATE: &str = "Resume:\n{resume_text}";

pub const JD_ANALYSIS_SYSTEM: &str =
    "You are a job description analyzer. Extract the following from the job description you are given:\n\
    - Role Summary\n\
    - Core Responsibilities\n\
    - Required Skills and Qualifications";

/// Replace `{jd_text}` before sending.
pub const JD_ANALYSIS_TEMPLATE: &str = "JD:\n{jd_text}";

pub const COMPARISON_SYSTEM: &str = r#"You are a comparison engine. Given a resume analysis and a job description (JD) analysis, do the following:

**Instructions:**
1. Identify and list **Matching Skills** using bullet points, with categories such as Programming, Cloud, Storage, etc.
2. Identify **Missing Skills**, even if partially present or indirectly implied. Use the format:
   * **<Skill Category>:** Explanation
3. Write a **Summary of Alignment**: 2 to 4 sentences summarizing the match.
4. Assign a **Match Score (/100)** considering both technical and soft skill alignment. Write the score exactly as <n>/100.
5. Follow the example format exactly."#;

/// Worked example of the expected comparison layout. Sent in the example/assistant slot.
pub const COMPARISON_EXAMPLE: &str = r#"**Matching Skills:**

* **Programming:** Python, SQL (Both)
* **Data Platforms:** Spark, Trino (Resume stronger)

**Missing Skills:**

* **Cloud Platforms:** Resume lacks AWS Glue, ADF
* **CI/CD Tools:** GitHub Actions not mentioned

**Summary of Alignment:**

The candidate demonstrates strong core competencies in data engineering and distributed processing. Cloud-native tooling and deployment automation are the main gaps.

**Match Score (/100):**
87/100"#;

/// Replace `{count}` before sending.
pub const QUESTIONS_SYSTEM_TEMPLATE: &str = r#"You are an interview coach. Based on the analysis you are given, generate {count} interview questions with expected answers. The goal is to probe the candidate further on their strengths and address possible gaps.

**Instructions:**
1. Generate exactly {count} questions unless the analysis makes that impossible.
2. For each question, return:
- The **Question**
- The **Expected Answer**
3. Use the following format:

**Question 1: Topic Title**

**Question:** "..."

**Expected Answer:** ...

**Question 2: Another Topic**

**Question:** "..."

**Expected Answer:** ..."#;

/// Replace `{comparison}` before sending.
pub const QUESTIONS_TEMPLATE: &str = "Comparison Result:\n{comparison}";

/// Replace `{refusal}` and `{count}` before sending.
pub const REFINEMENT_SYSTEM_TEMPLATE: &str = r#"You are an interview coach who is helping a user refine a set of interview questions.
Your task is to regenerate the interview questions based on new information provided by the user.
You must only respond with the regenerated questions in the same format as the original, or a warning if the user's request is off-topic.

**Guardrails:**
- Your ONLY function is to refine interview questions, add or remove questions based on the user's request.
- DO NOT answer questions or engage in conversation about anything else.
- If the user asks for something other than refining the questions, respond with ONLY the following message: "{refusal}"

**Instructions:**
1. If the user's request does not give a number of questions, produce {count} questions.
2. If the user asked for more questions, repeat all of the current questions exactly and append the number of new questions requested.
3. If the user asked to modify a specific question, modify only that question; every other question must be repeated exactly as before.
4. If the user asked for fewer questions without naming which ones, remove questions from the end.
5. If the user asked to remove specific questions, remove exactly those questions.
6. Use the following format:

**Question 1: Topic Title**

**Question:** "..."

**Expected Answer:** ...

**Question 2: Another Topic**

**Question:** "..."

**Expected Answer:** ..."#;

pub fn resume_analysis(resume_text: &str) -> PromptSections {
    PromptSections::new()
        .with_system(RESUME_ANALYSIS_SYSTEM)
        .with_user(RESUME_ANALYSIS_TEMPLATE.replace("{resume_text}", resume_text))
}

pub fn jd_analysis(jd_text: &str) -> PromptSections {
    PromptSections::new()
        .with_system(JD_ANALYSIS_SYSTEM)
        .with_user(JD_ANALYSIS_TEMPLATE.replace("{jd_text}", jd_text))
}

pub fn comparison(resume_analysis: &str, jd_analysis: &str) -> PromptSections {
    // Inputs may contain literal `{...}` text.
    let user = format!("Resume Analysis:\n{resume_analysis}\n\nJD Analysis:\n{jd_analysis}");
    PromptSections::new()
        .with_system(COMPARISON_SYSTEM)
        .with_assistant(COMPARISON_EXAMPLE)
        .with_user(user)
}

pub fn question_generation(comparison: &str, count: usize) -> PromptSections {
    PromptSections::new()
        .with_system(QUESTIONS_SYSTEM_TEMPLATE.replace("{count}", &count.to_string()))
        .with_user(QUESTIONS_TEMPLATE.replace("{comparison}", comparison))
}

/// `count` is the already-resolved default question count for this turn.
pub fn refinement(
    comparison_result_raw: &str,
    original_questions_raw: Option<&str>,
    history: &ConversationLog,
    user_message: &str,
    count: usize,
) -> PromptSections {
    let system = REFINEMENT_SYSTEM_TEMPLATE
        .replace("{refusal}", REFUSAL_MESSAGE)
        .replace("{count}", &count.to_string());

    let mut user = format!("**Original Comparison Result:**\n{comparison_result_raw}\n\n");
    if let Some(original) = original_questions_raw.filter(|q| !q.trim().is_empty()) {
        user.push_str(&format!("**Original Questions:**\n{original}\n\n"));
    }
    user.push_str("**Conversation History:**\n");
    if history.is_empty() {
        user.push_str("(none)\n");
    } else {
        user.push_str(&history.render());
        user.push('\n');
    }
    user.push_str(&format!("\n**User's Request:**\n{user_message}"));

    PromptSections::new().with_system(system).with_user(user)
}
