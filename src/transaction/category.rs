//! Guesses a transaction's category from its description.

use crate::transaction::TransactionType;

/// A category and the lower-case keywords that select it.
pub type CategoryKeywords = (&'static str, &'static [&'static str]);

/// The keywords used when a transaction is created without a category.
///
/// Categories are checked in order and the first match wins, so "gas" selects
/// "Transport" before "gas bill" can select "Utilities".
pub const DEFAULT_CATEGORY_KEYWORDS: &[CategoryKeywords] = &[
    (
        "Groceries",
        &[
            "grocery",
            "supermarket",
            "whole foods",
            "aldi",
            "lidl",
            "shoprite",
            "big c",
            "vinmart",
            "lotte",
        ],
    ),
    (
        "Transport",
        &[
            "uber", "lyft", "bus", "train", "metro", "fuel", "gas", "grab", "taxi", "subway",
        ],
    ),
    ("Rent", &["rent", "landlord", "apartment", "lease"]),
    (
        "Utilities",
        &[
            "electric", "water", "gas bill", "internet", "wifi", "fiber", "power",
        ],
    ),
    (
        "Dining",
        &[
            "restaurant",
            "coffee",
            "cafe",
            "pizza",
            "kfc",
            "mcdonald",
            "burger",
            "pho",
            "banh mi",
            "biryani",
        ],
    ),
    (
        "Shopping",
        &[
            "amazon", "mall", "target", "walmart", "clothes", "shoe", "zara", "uniqlo",
        ],
    ),
    (
        "Health",
        &["pharmacy", "doctor", "hospital", "clinic", "medicine"],
    ),
    (
        "Entertainment",
        &["netflix", "spotify", "movie", "game", "cinema"],
    ),
    (
        "Salary",
        &["salary", "payroll", "paycheck", "wage", "stipend"],
    ),
    (
        "Freelance",
        &["freelance", "contract", "gig", "upwork", "fiverr"],
    ),
    ("Interest", &["interest", "dividend", "yield"]),
];

/// Pick a category for a transaction from its `description`.
///
/// The description is matched case-insensitively against each keyword in
/// `keywords`. Income without a match is "Income", anything else without a
/// match is "Uncategorized".
pub fn auto_category(
    transaction_type: TransactionType,
    description: &str,
    keywords: &[CategoryKeywords],
) -> String {
    let description = description.trim().to_lowercase();

    if !description.is_empty() {
        let matched = keywords.iter().find(|(_, category_keywords)| {
            category_keywords
                .iter()
                .any(|keyword| description.contains(keyword))
        });

        if let Some((category, _)) = matched {
            return (*category).to_owned();
        }
    }

    match transaction_type {
        TransactionType::Income => "Income".to_owned(),
        TransactionType::Expense => "Uncategorized".to_owned(),
    }
}
