/// Advancement coordination and question timeout supervision.
pub mod advancement;
/// Answer recording and match reads.
pub mod answer_service;
/// Question bank seam used to draw match decks.
pub mod deck;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Matchmaking request lifecycle and claim arbitration.
pub mod matchmaking_service;
/// Log-based progress reconciliation.
pub mod progress;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
