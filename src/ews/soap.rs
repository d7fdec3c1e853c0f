//! SOAP envelopes for the EWS `FindItem` operation.

use super::models::{EmailAddress, EmailMessage, FindItemsResults, ItemId, ItemView, WellKnownFolderName};
use crate::error::EwsError;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

/// Schema version announced in every request.
const REQUEST_SERVER_VERSION: &str = "Exchange2013_SP1";

/// Build the `FindItem` request body for one page of `folder`.
pub fn find_item_request(folder: WellKnownFolderName, view: &ItemView) -> String {
    let additional: String = view
        .property_set
        .additional
        .iter()
        .map(|path| format!(r#"<t:FieldURI FieldURI="{}" />"#, path.field_uri()))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header>
    <t:RequestServerVersion Version="{version}" />
  </soap:Header>
  <soap:Body>
    <m:FindItem Traversal="Shallow">
      <m:ItemShape>
        <t:BaseShape>{base}</t:BaseShape>
        <t:AdditionalProperties>{additional}</t:AdditionalProperties>
      </m:ItemShape>
      <m:IndexedPageItemView MaxEntriesReturned="{page_size}" Offset="{offset}" BasePoint="Beginning" />
      <m:ParentFolderIds>
        <t:DistinguishedFolderId Id="{folder}" />
      </m:ParentFolderIds>
    </m:FindItem>
  </soap:Body>
</soap:Envelope>"#,
        version = REQUEST_SERVER_VERSION,
        base = view.property_set.base.as_str(),
        additional = additional,
        page_size = view.page_size,
        offset = view.offset,
        folder = folder.distinguished_id(),
    )
}

/// Accumulates what the `FindItem` response reports while its events stream by.
#[derive(Default)]
struct FindItemResponseParser {
    /// Local names of the currently open elements.
    path: Vec<String>,
    text: String,
    results: FindItemsResults,
    current: Option<EmailMessage>,
    saw_response_message: bool,
    response_class: Option<String>,
    response_code: Option<String>,
    message_text: Option<String>,
    fault: Option<String>,
    includes_last_item: Option<bool>,
    paging_offset: Option<u32>,
}

impl FindItemResponseParser {
    fn open(&mut self, element: &BytesStart<'_>) -> Result<(), EwsError> {
        let name = local_name(element);
        self.text.clear();

        match name.as_str() {
            "FindItemResponseMessage" => {
                self.saw_response_message = true;
                self.response_class = attribute(element, "ResponseClass")?;
            }
            "RootFolder" => {
                self.results.total_count = attribute(element, "TotalItemsInView")?
                    .map(|v| parse_number(&v))
                    .transpose()?
                    .unwrap_or(0);
                self.includes_last_item =
                    attribute(element, "IncludesLastItemInRange")?.map(|v| v == "true");
                self.paging_offset = attribute(element, "IndexedPagingOffset")?
                    .map(|v| parse_number(&v))
                    .transpose()?;
            }
            "ItemId" => {
                if let Some(message) = self.current.as_mut() {
                    message.id = Some(ItemId {
                        id: attribute(element, "Id")?.unwrap_or_default(),
                        change_key: attribute(element, "ChangeKey")?,
                    });
                }
            }
            _ => {}
        }

        // Every child of <Items> is one item, whatever its concrete type.
        if self.path.last().map(String::as_str) == Some("Items") {
            self.current = Some(EmailMessage::default());
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), EwsError> {
        let name = self.path.pop().unwrap_or_default();
        let text = std::mem::take(&mut self.text);
        let text = text.trim();
        let in_from = self.path.iter().any(|open| open == "From");

        if let Some(message) = self.current.as_mut() {
            match name.as_str() {
                "Subject" => message.subject = Some(text.to_string()),
                "DateTimeReceived" => {
                    let received = DateTime::parse_from_rfc3339(text).map_err(|e| {
                        EwsError::ParseFailed(format!("DateTimeReceived {text:?}: {e}"))
                    })?;
                    message.date_time_received = Some(received.with_timezone(&Utc));
                }
                "HasAttachments" => message.has_attachments = Some(text == "true"),
                "Name" if in_from => {
                    message.from.get_or_insert_with(EmailAddress::default).name =
                        Some(text.to_string());
                }
                "EmailAddress" if in_from => {
                    message.from.get_or_insert_with(EmailAddress::default).address =
                        Some(text.to_string());
                }
                _ => {}
            }
        }

        match name.as_str() {
            "ResponseCode" => self.response_code = Some(text.to_string()),
            "MessageText" => self.message_text = Some(text.to_string()),
            "faultstring" => self.fault = Some(text.to_string()),
            _ => {}
        }

        if self.path.last().map(String::as_str) == Some("Items") {
            if let Some(message) = self.current.take() {
                self.results.items.push(message);
            }
        }

        Ok(())
    }

    fn finish(mut self) -> Result<FindItemsResults, EwsError> {
        if !self.path.is_empty() {
            return Err(EwsError::ParseFailed("unexpected end of document".into()));
        }

        if let Some(fault) = self.fault {
            return Err(EwsError::Fault(fault));
        }

        if !self.saw_response_message {
            return Err(EwsError::ParseFailed(
                "missing FindItemResponseMessage".into(),
            ));
        }

        match self.response_class.as_deref() {
            Some("Error") => {
                return Err(EwsError::Response {
                    code: self.response_code.unwrap_or_else(|| "Unknown".into()),
                    message: self.message_text.unwrap_or_default(),
                });
            }
            Some("Warning") => warn!(
                "FindItem completed with warning {}: {}",
                self.response_code.as_deref().unwrap_or("Unknown"),
                self.message_text.as_deref().unwrap_or_default()
            ),
            _ => {}
        }

        self.results.more_available = !self.includes_last_item.unwrap_or(true);
        self.results.next_page_offset = if self.results.more_available {
            self.paging_offset
        } else {
            None
        };

        Ok(self.results)
    }
}

/// Parse a `FindItem` response envelope (or a SOAP fault).
pub fn parse_find_item_response(xml: &str) -> Result<FindItemsResults, EwsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = FindItemResponseParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                parser.open(&element)?;
                parser.path.push(local_name(&element));
            }
            Ok(Event::Empty(element)) => {
                parser.open(&element)?;
                // Self-closing items still count as one item.
                if parser.path.last().map(String::as_str) == Some("Items") {
                    if let Some(message) = parser.current.take() {
                        parser.results.items.push(message);
                    }
                }
            }
            Ok(Event::End(_)) => parser.close()?,
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| EwsError::ParseFailed(e.to_string()))?;
                parser.text.push_str(&text);
            }
            Ok(Event::CData(data)) => parser.text.push_str(&String::from_utf8_lossy(&data)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(EwsError::ParseFailed(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    parser.finish()
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, EwsError> {
    let attribute = element
        .try_get_attribute(name)
        .map_err(|e| EwsError::ParseFailed(e.to_string()))?;

    attribute
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .map_err(|e| EwsError::ParseFailed(e.to_string()))
        })
        .transpose()
}

fn parse_number(value: &str) -> Result<u32, EwsError> {
    value
        .trim()
        .parse()
        .map_err(|_| EwsError::ParseFailed(format!("expected a number, got {value:?}")))
}

#[cfg(test)]
pub(crate) const SAMPLE_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Header>
    <h:ServerVersionInfo MajorVersion="15" MinorVersion="20" xmlns:h="http://schemas.microsoft.com/exchange/services/2006/types"/>
  </s:Header>
  <s:Body>
    <m:FindItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:FindItemResponseMessage ResponseClass="Success">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:RootFolder IndexedPagingOffset="2" TotalItemsInView="57" IncludesLastItemInRange="false">
            <t:Items>
              <t:Message>
                <t:ItemId Id="AAMkAD1" ChangeKey="CQAAAB1"/>
                <t:Subject>Lunch &amp; learn</t:Subject>
                <t:DateTimeReceived>2024-03-01T09:30:00Z</t:DateTimeReceived>
                <t:HasAttachments>true</t:HasAttachments>
                <t:From>
                  <t:Mailbox>
                    <t:Name>Megan Bowen</t:Name>
                    <t:EmailAddress>megan@contoso.com</t:EmailAddress>
                    <t:RoutingType>SMTP</t:RoutingType>
                  </t:Mailbox>
                </t:From>
              </t:Message>
              <t:MeetingRequest>
                <t:ItemId Id="AAMkAD2" ChangeKey="CQAAAB2"/>
                <t:Subject>Planning</t:Subject>
                <t:DateTimeReceived>2024-02-28T17:05:12Z</t:DateTimeReceived>
                <t:HasAttachments>false</t:HasAttachments>
              </t:MeetingRequest>
            </t:Items>
          </m:RootFolder>
        </m:FindItemResponseMessage>
      </m:ResponseMessages>
    </m:FindItemResponse>
  </s:Body>
</s:Envelope>"#;
