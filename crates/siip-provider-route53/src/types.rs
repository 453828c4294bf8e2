//! Route 53 REST/XML payloads

use serde::{Deserialize, Serialize};

pub(crate) const XMLNS: &str = "https://route53.amazonaws.com/doc/2013-04-01/";

// ============ ListResourceRecordSets ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ListResourceRecordSetsResponse {
    #[serde(default)]
    pub resource_record_sets: ResourceRecordSetList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResourceRecordSetList {
    #[serde(rename = "ResourceRecordSet", default)]
    pub items: Vec<ResourceRecordSet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ResourceRecordSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Absent on alias records
    #[serde(rename = "ResourceRecords", default)]
    pub resource_records: ResourceRecordList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ResourceRecordList {
    #[serde(rename = "ResourceRecord", default)]
    pub items: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ResourceRecord {
    #[serde(rename = "Value")]
    pub value: String,
}

// ============ ChangeResourceRecordSets ============

#[derive(Debug, Serialize)]
#[serde(rename = "ChangeResourceRecordSetsRequest")]
pub(crate) struct ChangeResourceRecordSetsRequest {
    #[serde(rename = "@xmlns")]
    pub xmlns: &'static str,
    #[serde(rename = "ChangeBatch")]
    pub change_batch: ChangeBatch,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeBatch {
    #[serde(rename = "Comment")]
    pub comment: String,
    #[serde(rename = "Changes")]
    pub changes: ChangeList,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeList {
    #[serde(rename = "Change")]
    pub items: Vec<Change>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Change {
    #[serde(rename = "Action")]
    pub action: &'static str,
    #[serde(rename = "ResourceRecordSet")]
    pub resource_record_set: ResourceRecordSet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ChangeResourceRecordSetsResponse {
    pub change_info: ChangeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ChangeInfo {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

// ============ Errors ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_listing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListResourceRecordSetsResponse xmlns="https://route53.amazonaws.com/doc/2013-04-01/">
  <ResourceRecordSets>
    <ResourceRecordSet>
      <Name>host.example.com.</Name>
      <Type>A</Type>
      <TTL>300</TTL>
      <ResourceRecords>
        <ResourceRecord><Value>1.2.3.4</Value></ResourceRecord>
      </ResourceRecords>
    </ResourceRecordSet>
  </ResourceRecordSets>
  <IsTruncated>false</IsTruncated>
  <MaxItems>1</MaxItems>
</ListResourceRecordSetsResponse>"#;

        let parsed: ListResourceRecordSetsResponse = quick_xml::de::from_str(xml).unwrap();
        let sets = parsed.resource_record_sets.items;

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "host.example.com.");
        assert_eq!(sets[0].record_type, "A");
        assert_eq!(sets[0].ttl, Some(300));
        assert_eq!(sets[0].resource_records.items[0].value, "1.2.3.4");
    }

    #[test]
    fn parses_empty_listing() {
        let xml = r#"<ListResourceRecordSetsResponse xmlns="https://route53.amazonaws.com/doc/2013-04-01/"><ResourceRecordSets></ResourceRecordSets><IsTruncated>false</IsTruncated><MaxItems>1</MaxItems></ListResourceRecordSetsResponse>"#;

        let parsed: ListResourceRecordSetsResponse = quick_xml::de::from_str(xml).unwrap();
        assert!(parsed.resource_record_sets.items.is_empty());
    }

    #[test]
    fn serializes_change_batch() {
        let request = ChangeResourceRecordSetsRequest {
            xmlns: XMLNS,
            change_batch: ChangeBatch {
                comment: "Automatic DNS update".to_string(),
                changes: ChangeList {
                    items: vec![Change {
                        action: "UPSERT",
                        resource_record_set: ResourceRecordSet {
                            name: "host.example.com".to_string(),
                            record_type: "A".to_string(),
                            ttl: Some(300),
                            resource_records: ResourceRecordList {
                                items: vec![ResourceRecord {
                                    value: "5.6.7.8".to_string(),
                                }],
                            },
                        },
                    }],
                },
            },
        };

        let xml = quick_xml::se::to_string(&request).unwrap();

        assert!(xml.starts_with(
            r#"<ChangeResourceRecordSetsRequest xmlns="https://route53.amazonaws.com/doc/2013-04-01/">"#
        ));
        assert!(xml.contains("<Comment>Automatic DNS update</Comment>"));
        assert!(xml.contains("<Action>UPSERT</Action>"));
        assert!(xml.contains("<Name>host.example.com</Name>"));
        assert!(xml.contains("<TTL>300</TTL>"));
        assert!(xml.contains("<ResourceRecord><Value>5.6.7.8</Value></ResourceRecord>"));
    }

    #[test]
    fn parses_error_response() {
        let xml = r#"<?xml version="1.0"?>
<ErrorResponse xmlns="https://route53.amazonaws.com/doc/2013-04-01/">
  <Error>
    <Type>Sender</Type>
    <Code>NoSuchHostedZone</Code>
    <Message>No hosted zone found with ID: Z0123</Message>
  </Error>
  <RequestId>abc</RequestId>
</ErrorResponse>"#;

        let parsed: ErrorResponse = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(parsed.error.code, "NoSuchHostedZone");
        assert_eq!(parsed.error.message, "No hosted zone found with ID: Z0123");
    }
}
