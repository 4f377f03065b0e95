pub mod client;
pub mod planner;
pub mod schema;
pub mod serpapi;

pub use client::{SearchClient, SearchError, SearchProvider};
pub use planner::{classify_industry, company_plan, market_plan, rank_document_candidates};
pub use schema::{SearchPlan, SearchResult};
pub use serpapi::{SearchLocale, SerpApiClient};
