//! 📜 The fixed JSON documents the bootstrapper installs on the cluster.
//!
//! One ingest pipeline and two index templates (6.x still wraps mappings in a
//! `_doc` type, 7.x stopped doing that). Held in [`SchemaResources`] so each
//! appender owns its own immutable copy instead of reaching for a global.

/// 🔧 Grok the pattern-layout line into fields, then drop the raw `message`.
///
/// Matches `[timestamp][hostname][LEVEL][class] msg` as produced by
/// [`PatternLayout`](crate::layout::PatternLayout). Both processors ignore
/// failures: a line that doesn't parse is still indexed, just unstructured.
pub const LOG4J_PIPELINE: &str = r#"{
  "processors": [
    {
      "grok": {
        "field": "message",
        "patterns": [
          "\\[%{TIMESTAMP_ISO8601:@timestamp}\\]\\[%{DATA:hostname}\\]\\[%{WORD:level}(%{SPACE})?\\]\\[%{DATA:class}(%{SPACE})?\\](%{SPACE})?(?<msg>(.|\\r|\\n)*)"
        ],
        "ignore_failure": true
      }
    },
    {
      "remove": {
        "field": [
          "message"
        ],
        "ignore_failure": true
      }
    }
  ]
}"#;

/// 📦 Index template for 6.x clusters, mappings under the `_doc` type.
pub const LOG4J_TEMPLATE_V6: &str = r#"{
  "order": 0,
  "index_patterns": [
    "log4j-*"
  ],
  "settings": {
    "index": {
      "refresh_interval": "5s",
      "number_of_shards": "1"
    }
  },
  "mappings": {
    "_doc": {
      "dynamic_templates": [
        {
          "strings_as_keyword": {
            "mapping": {
              "ignore_above": 1024,
              "type": "keyword"
            },
            "match_mapping_type": "string"
          }
        }
      ],
      "properties": {
        "@timestamp": {
          "type": "date"
        },
        "class": {
          "type": "text",
          "analyzer": "simple"
        },
        "msg": {
          "type": "text",
          "analyzer": "simple"
        }
      }
    }
  },
  "aliases": {}
}
"#;

/// 📦 Index template for 7.x clusters. Same mappings, no type wrapper.
pub const LOG4J_TEMPLATE_V7: &str = r#"{
  "order": 0,
  "index_patterns": [
    "log4j-*"
  ],
  "settings": {
    "index": {
      "refresh_interval": "5s",
      "number_of_shards": "1"
    }
  },
  "mappings": {
    "dynamic_templates": [
      {
        "strings_as_keyword": {
          "mapping": {
            "ignore_above": 1024,
            "type": "keyword"
          },
          "match_mapping_type": "string"
        }
      }
    ],
    "properties": {
      "@timestamp": {
        "type": "date"
      },
      "class": {
        "type": "text",
        "analyzer": "simple"
      },
      "msg": {
        "type": "text",
        "analyzer": "simple"
      }
    }
  },
  "aliases": {}
}
"#;

/// 📜 The documents one appender installs. Defaults to the built-ins above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaResources {
    pub template_v6: String,
    pub template_v7: String,
    pub pipeline: String,
}

impl Default for SchemaResources {
    fn default() -> Self {
        Self {
            template_v6: LOG4J_TEMPLATE_V6.to_string(),
            template_v7: LOG4J_TEMPLATE_V7.to_string(),
            pipeline: LOG4J_PIPELINE.to_string(),
        }
    }
}

impl SchemaResources {
    /// 🎯 6.x gets the typed template, everything else the typeless one.
    pub fn template_for(&self, major_version: i32) -> &str {
        if major_version == 6 {
            &self.template_v6
        } else {
            &self.template_v7
        }
    }
}
