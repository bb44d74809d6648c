use crate::error::Result;
use crate::period::Period;
use crate::trade::Observation;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

/// Dimension values of the `<Series>` currently being read
#[derive(Default)]
struct SeriesKey {
    importer: Option<String>,
    counterpart: Option<String>,
}

/// Attribute value by local name, ignoring any namespace prefix
fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parse an SDMX compact or structure-specific data message into observations.
///
/// Series are matched by local name so both the IMF compact format and SDMX 2.1
/// structure-specific messages are accepted. Observations with an unparsable
/// period are skipped; unparsable values are kept as `None`.
pub fn parse_observations(xml: &str) -> Result<Vec<Observation>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut observations = Vec::new();
    let mut series: Option<SeriesKey> = None;
    let mut skipped = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"Series" => {
                series = Some(SeriesKey {
                    importer: attribute(&e, b"REF_AREA")?,
                    counterpart: attribute(&e, b"COUNTERPART_AREA")?,
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"Series" => {
                // A series without observations
                series = None;
            }
            Event::End(e) if e.local_name().as_ref() == b"Series" => {
                series = None;
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Obs" => {
                let Some(SeriesKey {
                    importer: Some(importer),
                    counterpart: Some(counterpart),
                }) = series.as_ref()
                else {
                    skipped += 1;
                    continue;
                };

                let period = attribute(&e, b"TIME_PERIOD")?.and_then(|p| p.parse::<Period>().ok());
                let Some(period) = period else {
                    skipped += 1;
                    continue;
                };

                // Non-finite values count as missing
                let value = attribute(&e, b"OBS_VALUE")?
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite());

                observations.push(Observation {
                    importer: importer.clone(),
                    counterpart: counterpart.clone(),
                    period,
                    value,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(
        observations = observations.len(),
        skipped, "parsed SDMX data message"
    );
    Ok(observations)
}
