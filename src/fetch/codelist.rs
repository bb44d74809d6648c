use crate::error::Result;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// Parse an SDMX 2.0 code list into `code -> description`.
///
/// Only the first `<Description>` of each `<Code>` is used, so multilingual
/// lists resolve to their leading language.
pub fn parse_codes(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut codes = HashMap::new();
    let mut current: Option<String> = None;
    let mut in_description = false;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"Code" => {
                current = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.local_name().as_ref() == b"value" {
                        current = Some(attr.unescape_value()?.into_owned());
                    }
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"Code" => {
                current = None;
            }
            Event::Start(e) if e.local_name().as_ref() == b"Description" && current.is_some() => {
                in_description = true;
                text.clear();
            }
            Event::Text(t) if in_description => {
                text.push_str(&t.unescape()?);
            }
            Event::End(e) if e.local_name().as_ref() == b"Description" && in_description => {
                in_description = false;
                if let Some(code) = current.as_ref() {
                    codes.entry(code.clone()).or_insert_with(|| text.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE_LIST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Structure xmlns="http://www.SDMX.org/resources/SDMXML/schemas/v2_0/message"
           xmlns:structure="http://www.SDMX.org/resources/SDMXML/schemas/v2_0/structure">
  <CodeLists>
    <structure:CodeList id="CL_AREA_DOT" agencyID="IMF">
      <structure:Name xml:lang="en">Geographical Areas</structure:Name>
      <structure:Description xml:lang="en">List of areas</structure:Description>
      <structure:Code value="US">
        <structure:Description xml:lang="en">United States</structure:Description>
      </structure:Code>
      <structure:Code value="CN">
        <structure:Description xml:lang="en">China, P.R.: Mainland</structure:Description>
        <structure:Description xml:lang="fr">Chine</structure:Description>
      </structure:Code>
      <structure:Code value="B0">
        <structure:Description xml:lang="en">EU (Member States and Institutions of the European Union) changing composition</structure:Description>
      </structure:Code>
      <structure:Code value="XX" />
    </structure:CodeList>
  </CodeLists>
</Structure>"#;

    #[test]
    fn test_parse_code_list() {
        let codes = parse_codes(CODE_LIST).unwrap();
        assert_eq!(codes.len(), 3);
        assert_eq!(codes["US"], "United States");
        assert_eq!(codes["CN"], "China, P.R.: Mainland");
        assert!(codes["B0"].starts_with("EU (Member States"));
        assert!(!codes.contains_key("XX"));
    }

    #[test]
    fn test_escaped_text() {
        let xml = r#"<Structure><Code value="TT"><Description>Trinidad &amp; Tobago</Description></Code></Structure>"#;
        assert_eq!(parse_codes(xml).unwrap()["TT"], "Trinidad & Tobago");
    }
}
