//! Prompt builders for every model call in the two pipelines.
//!
//! Exact wording is deliberately plain; the structure of each prompt
//! (which inputs it carries, and what output shape it asks for) is the
//! contract the workflows depend on.

/// Main answer generation over retrieved document context.
pub fn generator_prompt(history: &str, document: &str, question: &str) -> String {
    format!(
        "You are an expert assistant answering questions from the provided documents. \
         Rely only on the Knowledge Base and the conversation context below. If the \
         question falls outside the documents' scope, say so politely. Answer directly \
         and thoroughly, as plain text, without preamble or closing remarks.\n\n\
         Conversation Context: {history}\n\n\
         Knowledge Base: {document}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

/// Groundedness judge: is the answer supported by the documents or the
/// conversation context? Expects a yes/no score in the reply.
pub fn groundedness_prompt(documents: &str, generation: &str, history: &str) -> String {
    format!(
        "Evaluate whether the Answer is supported by either the Documents OR the \
         Conversation Context. Support may come from either one alone.\n\n\
         Documents: {documents}\n\n\
         Conversation Context: {history}\n\n\
         Answer to evaluate: {generation}\n\n\
         Score 'no' if it contains claims not found in, or contradicted by, the \
         Documents and the Conversation Context. Otherwise score 'yes'.\n\n\
         {{\"score\": \"yes\"}} or {{\"score\": \"no\"}}"
    )
}

/// Relevance judge: does the answer address the question? Expects a
/// yes/no score in the reply.
pub fn relevance_prompt(question: &str, generation: &str, history: &str) -> String {
    format!(
        "Does this answer adequately address the question? Consider the conversation \
         context where relevant.\n\n\
         Answer to evaluate: {generation}\n\n\
         Conversation context: {history}\n\n\
         Question: {question}\n\n\
         Score 'yes' if the answer provides relevant detail and fits the conversation \
         flow. Score 'no' if it is off-topic.\n\n\
         {{\"score\": \"yes\"}} or {{\"score\": \"no\"}}"
    )
}

/// Question restatement used before a retry retrieval pass.
pub fn rewrite_prompt(question: &str) -> String {
    format!(
        "Rephrase the question below so it is clear and self-contained.\n\n\
         Original Question: {question}\n\n\
         Output:"
    )
}

/// Analysis planning over the dataset's columns and declared types.
/// Asks for a JSON list of strings; the caller tolerates other shapes.
pub fn planning_prompt(question: &str, columns: &str, column_types: &str) -> String {
    format!(
        "You are a data-analysis assistant. Given a question about a dataset and the \
         dataset's columns, produce an ordered plan of the steps needed to answer the \
         question. The steps must be executable in sequence.\n\n\
         User Question: {question}\n\n\
         Available Columns: {columns}\n\n\
         Column Types:\n{column_types}\n\n\
         Return a JSON list of strings ONLY, with no other text. \
         Example: [\"step 1\", \"step 2\", \"step 3\"]\n\
         JSON Output:"
    )
}

/// Code generation for one analysis pass over the bound dataset.
pub fn code_prompt(
    dataset_path: &str,
    shape: (usize, usize),
    columns: &str,
    column_types: &str,
    column_samples: &str,
    question: &str,
    plan: &str,
) -> String {
    format!(
        "You are a Python data-analysis expert. A pandas DataFrame named 'df' is \
         already loaded. Write Python code that executes the plan below to answer the \
         question.\n\n\
         DataFrame Info:\n\
         - Data: {dataset_path}\n\
         - Shape: ({rows}, {cols})\n\
         - Columns: {columns}\n\n\
         Column Types:\n{column_types}\n\n\
         Sample Column Values (up to 10 per column):\n{column_samples}\n\n\
         User Question: {question}\n\n\
         Plan Steps:\n{plan}\n\n\
         Requirements:\n\
         1. Use 'df' for the DataFrame; never construct your own data.\n\
         2. Available libraries: pandas (pd), numpy (np), matplotlib.pyplot (plt), seaborn (sns).\n\
         3. Return executable Python code only. No explanations, no markdown, no code fences.\n\
         4. Print the final result. If it is a DataFrame, print df.to_string().",
        rows = shape.0,
        cols = shape.1,
    )
}

/// Interpretation of the captured execution output.
pub fn interpretation_prompt(question: &str, plan: &str, output: &str, columns: &str) -> String {
    let output_section = if output.trim().is_empty() {
        "No output.".to_string()
    } else {
        format!("Execution Output:\n{output}")
    };
    format!(
        "You are a data-analysis expert. Analyze the results below objectively and \
         keep the values raw. DO NOT SHOW CODE.\n\n\
         Dataset columns: {columns}\n\n\
         Original Question: {question}\n\
         Plan: {plan}\n\
         {output_section}\n\n\
         Always start with the direct answer, then say whether the result is \
         favorable, unfavorable, or neutral, and explain why in a couple of \
         sentences. If there is no usable output, decline politely instead."
    )
}
