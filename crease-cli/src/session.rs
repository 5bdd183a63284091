//! Interactive question/answer loop.

use std::collections::BTreeSet;
use std::io;

use crease_core::advisor::{AdviceResult, Advisor, QueryType};
use crease_core::fetcher::Fetcher;
use crease_core::generator::ResponseGenerator;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// What happened over one interactive session.
#[derive(Debug, Default)]
pub struct SessionSummary {
    confidences: Vec<f64>,
    query_types: BTreeSet<QueryType>,
}

impl SessionSummary {
    pub fn record(&mut self, result: &AdviceResult) {
        self.confidences.push(result.confidence_score);
        self.query_types.insert(result.query_type);
    }

    pub fn total_queries(&self) -> usize {
        self.confidences.len()
    }

    /// Mean confidence over answered queries, 0 when none were answered.
    pub fn average_confidence(&self) -> f64 {
        if self.confidences.is_empty() {
            return 0.0;
        }
        self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
    }

    pub fn render(&self) -> String {
        let types: Vec<&str> = self.query_types.iter().map(|t| t.as_str()).collect();
        format!(
            "Session Summary:\nTotal queries: {}\nAverage confidence: {:.2}\nQuery types: [{}]\n",
            self.total_queries(),
            self.average_confidence(),
            types.join(", ")
        )
    }
}

/// A 1-5 rating, or `None` for anything else (including a skipped prompt).
pub fn parse_rating(input: &str) -> Option<u8> {
    let input = input.trim();
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse::<u8>().ok().filter(|n| (1..=5).contains(n))
}

fn render_advice(result: &AdviceResult) -> String {
    format!(
        "\nAdvisor: {}\nConfidence Score: {:.2}\nQuery Type: {}\nContext Sources: dynamic={}, static={}, total_length={}\n",
        result.response_text,
        result.confidence_score,
        result.query_type,
        result.dynamic_context_count,
        result.static_context_count,
        result.total_context_length
    )
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await
}

/// Read questions from `input` until `exit` or end of input. `stats` prints
/// the store statistics; a failed question is reported and the loop goes on.
pub async fn run_chat<F, G, R, W>(
    advisor: &Advisor<F, G>,
    input: R,
    output: &mut W,
) -> io::Result<SessionSummary>
where
    F: Fetcher,
    G: ResponseGenerator,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut summary = SessionSummary::default();

    prompt(
        output,
        "Fantasy IPL Advisor - Ask me anything about IPL players, stats, or strategies!\n\
         Type 'exit' to quit, 'stats' to see vector store statistics.\n",
    )
    .await?;

    loop {
        prompt(output, "\nYour question: ").await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.eq_ignore_ascii_case("stats") {
            let stats = advisor.store().get_stats().await;
            let json = serde_json::to_string_pretty(&stats).map_err(io::Error::other)?;
            prompt(output, &format!("\nVector Store Statistics: {json}\n")).await?;
            continue;
        }

        match advisor.get_advice(query).await {
            Ok(result) => {
                prompt(output, &render_advice(&result)).await?;
                summary.record(&result);

                prompt(output, "\nRate this response (1-5, or press Enter to skip): ").await?;
                let Some(rating) = lines.next_line().await? else {
                    break;
                };
                if let Some(score) = parse_rating(&rating) {
                    log::info!("session {} rated {score}/5", result.session_id);
                    prompt(output, &format!("Thank you for rating: {score}/5\n")).await?;
                }
            }
            Err(e) => {
                log::warn!("query failed: {e}");
                prompt(output, &format!("Error: {e}\n")).await?;
            }
        }
    }

    Ok(summary)
}
