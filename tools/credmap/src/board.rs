use crate::errors::CredmapError;
use crate::field::FieldId;
use crate::partition::{BucketId, BucketSnapshot, BucketsView};
use crate::readiness::Readiness;
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Terminal;

pub fn field_label(field: &FieldId) -> String {
    let selector = field
        .descriptor()
        .primary()
        .unwrap_or("<no selector>")
        .to_string();
    format!("{} {selector}", field.short_digest())
}

fn bucket_title(bucket: &BucketSnapshot) -> String {
    let marker = if bucket.required { "*" } else { "" };
    format!("{}{marker} ({})", bucket.id, bucket.fields.len())
}

fn bucket_items(bucket: &BucketSnapshot) -> Vec<ListItem<'static>> {
    let resolves_value = bucket.id != BucketId::Unassigned;
    bucket
        .fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let style = if resolves_value && index == 0 {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{index:>2} "), Style::default().fg(Color::Cyan)),
                Span::styled(field_label(field), style),
            ]))
        })
        .collect()
}

pub fn status_line(readiness: &Readiness) -> String {
    if readiness.is_ready() {
        "ready: generate will produce a payload".to_string()
    } else {
        format!("not ready: {readiness}")
    }
}

/// Draws one column per bucket plus a status footer into a `width` x
/// `height` text frame.
pub fn render_board(
    view: &BucketsView,
    readiness: &Readiness,
    width: u16,
    height: u16,
) -> Result<String, CredmapError> {
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| CredmapError::Output(e.to_string()))?;
    let columns = u32::try_from(view.buckets.len().max(1)).unwrap_or(u32::MAX);

    terminal
        .draw(|frame| {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(3)])
                .split(frame.area());

            let cells = Layout::default()
                .direction(Direction::Horizontal)
                .constraints((0..columns).map(|_| Constraint::Ratio(1, columns)))
                .split(rows[0]);

            for (bucket, area) in view.buckets.iter().zip(cells.iter()) {
                frame.render_widget(
                    List::new(bucket_items(bucket))
                        .block(Block::default().borders(Borders::ALL).title(bucket_title(bucket))),
                    *area,
                );
            }

            let status_style = if readiness.is_ready() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            };
            frame.render_widget(
                Paragraph::new(Span::styled(status_line(readiness), status_style))
                    .block(Block::default().borders(Borders::ALL).title("Status")),
                rows[1],
            );
        })
        .map_err(|e| CredmapError::Output(e.to_string()))?;

    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..height {
        let mut line = String::new();
        for x in 0..width {
            line.push_str(buffer[(x, y)].symbol());
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    Ok(out)
}

/// Plain listing for non-interactive output.
pub fn render_plain(view: &BucketsView, readiness: &Readiness) -> Vec<String> {
    let mut lines = Vec::new();
    for bucket in &view.buckets {
        lines.push(format!("{}:", bucket_title(bucket)));
        for (index, field) in bucket.fields.iter().enumerate() {
            lines.push(format!("  {index:>2} {}", field_label(field)));
        }
    }
    lines.push(status_line(readiness));
    lines
}

#[cfg(test)]
mod tests {
    use super::{render_board, render_plain};
    use crate::field::extract;
    use crate::partition::{default_roles, Partition};
    use crate::readiness::{check, ReadinessPolicy};
    use crate::recording::load;
    use serde_json::json;

    fn partition() -> Partition {
        let recording = load(
            &json!({"steps": [
                {"type": "change", "selectors": [["#user"]], "value": "a"},
                {"type": "change", "selectors": [["#pass"], ["xpath//input"]], "value": "b"}
            ]})
            .to_string(),
        )
        .expect("load");
        Partition::new(extract(&recording), &default_roles())
    }

    #[test]
    fn board_shows_every_bucket_and_status() {
        let partition = partition();
        let readiness = check(&partition, &ReadinessPolicy::default());
        let frame = render_board(&partition.buckets_view(), &readiness, 140, 16).expect("frame");

        assert!(frame.contains("unassigned (2)"));
        assert!(frame.contains("usernameMappings* (0)"));
        assert!(frame.contains("newPasswordMappings* (0)"));
        assert!(frame.contains("#user"));
        assert!(frame.contains("not ready: 2 unassigned field(s)"));
        assert_eq!(frame.lines().count(), 16);
    }

    #[test]
    fn tiny_frames_still_render() {
        let partition = partition();
        let readiness = check(&partition, &ReadinessPolicy::default());
        assert!(render_board(&partition.buckets_view(), &readiness, 10, 4).is_ok());
    }

    #[test]
    fn plain_listing_numbers_fields() {
        let partition = partition();
        let readiness = check(&partition, &ReadinessPolicy::default());
        let lines = render_plain(&partition.buckets_view(), &readiness);
        assert_eq!(lines[0], "unassigned (2):");
        assert!(lines[1].starts_with("   0 "));
        assert!(lines[2].ends_with(" #pass"));
        assert!(lines.last().is_some_and(|line| line.starts_with("not ready")));
    }
}
