//! Prompt template and built-in sample questions.

/// Questions offered to users who don't want to type their own.
pub const SAMPLE_QUERIES: [&str; 4] = [
    "Given salary, liabilities, and timeline, is purchasing Mahindra XUV 7XO by year-end feasible?",
    "Which bank can we take a car loan from with the lowest interest rate?",
    "What are the key factors to consider when planning a vehicle purchase?",
    "How should liabilities affect the decision to purchase a car?",
];

/// Embed the graph context and the question into the advisor template.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert financial advisor analyzing a knowledge graph.\n\n\
         {context}\n\n\
         Answer the following question based on the knowledge graph:\n\
         {question}\n\n\
         Provide a clear, structured response with specific steps and recommendations."
    )
}
