//! Flat CSV rendering for the export endpoint.
//!
//! Fixed header covering the base fields and every known metric; NULL
//! channels render as empty fields; fields containing the delimiter, a
//! quote, or a newline are quoted with doubled inner quotes.

use std::borrow::Cow;

use crate::models::{MeasurementView, CHANNEL_NAMES};

// ---

/// Header row: `id,device,fecha,hora,<every metric in canonical order>`.
pub fn header() -> String {
    // ---
    let mut cols = vec!["id", "device", "fecha", "hora"];
    cols.extend(CHANNEL_NAMES);
    cols.join(",")
}

fn escape(field: &str) -> Cow<'_, str> {
    // ---
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn channel_field(value: Option<f64>) -> String {
    // NULL is an empty field, never "0".
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One data line (without trailing newline), fields in header order.
pub fn render_row(row: &MeasurementView) -> String {
    // ---
    let mut fields = vec![
        row.id.to_string(),
        escape(&row.device).into_owned(),
        row.fecha.clone(),
        row.hora.clone(),
    ];
    fields.extend(row.channels.values().into_iter().map(channel_field));
    fields.join(",")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Channels;

    fn view(id: i64, device: &str, channels: Channels) -> MeasurementView {
        // ---
        MeasurementView {
            id,
            device: device.to_string(),
            fecha: "2025-06-01".to_string(),
            hora: "12:30:05".to_string(),
            channels,
        }
    }

    #[test]
    fn header_lists_base_fields_then_every_metric() {
        // ---
        let header = header();
        assert!(header.starts_with("id,device,fecha,hora,voltaje,"));
        assert_eq!(header.split(',').count(), 4 + CHANNEL_NAMES.len());
        assert!(header.ends_with("potencia1,potencia2,potencia3"));
    }

    #[test]
    fn null_channels_render_as_empty_fields() {
        // ---
        let channels = Channels {
            voltaje: Some(3.3),
            ..Channels::default()
        };
        let line = render_row(&view(1, "s2", channels));

        assert_eq!(line, "1,s2,2025-06-01,12:30:05,3.3,,,,,,,,,,,,,");
    }

    #[test]
    fn fields_with_delimiter_or_quote_are_escaped() {
        // ---
        let line = render_row(&view(2, "s2,\"beta\"", Channels::default()));
        assert!(line.starts_with("2,\"s2,\"\"beta\"\"\",2025-06-01"));

        let newline = render_row(&view(3, "s2\nwroom", Channels::default()));
        assert!(newline.contains("\"s2\nwroom\""));
    }

    #[test]
    fn export_round_trips_through_a_csv_parse() {
        // ---
        let rows = vec![
            view(
                1,
                "s2",
                Channels {
                    voltaje: Some(12.5),
                    temperatura: Some(31.0),
                    ..Channels::default()
                },
            ),
            view(
                2,
                "wroom",
                Channels {
                    voltaje1: Some(11.0),
                    ..Channels::default()
                },
            ),
        ];
        let rendered = format!(
            "{}\n{}\n{}\n",
            header(),
            render_row(&rows[0]),
            render_row(&rows[1])
        );
        let lines: Vec<&str> = rendered.trim_end().lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header());

        // No field here needs quoting, so a plain split recovers the tuple.
        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields[0], "1");
        assert_eq!(fields[1], "s2");
        assert_eq!(fields[4], "12.5"); // voltaje
        assert_eq!(fields[8], "31"); // temperatura
        assert_eq!(fields[9], ""); // voltaje1 is NULL

        let fields: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(fields[1], "wroom");
        assert_eq!(fields[4], ""); // voltaje is NULL
        assert_eq!(fields[9], "11"); // voltaje1
    }
}
