//! The fixed set of tool names the model can call.
//!
//! Every tool registered in a [`ToolSet`](super::core::ToolSet) is keyed by
//! one of these variants; names coming back from the model are parsed into a
//! [`ToolName`] before dispatch.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolName {
    SemanticSearch,
    AddDocuments,
    CreateCollection,
    ListCollections,
    PdfToChunks,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::SemanticSearch,
        ToolName::AddDocuments,
        ToolName::CreateCollection,
        ToolName::ListCollections,
        ToolName::PdfToChunks,
    ];

    /// Wire name used in function-calling definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SemanticSearch => "semantic_search",
            ToolName::AddDocuments => "add_documents",
            ToolName::CreateCollection => "create_collection",
            ToolName::ListCollections => "list_collections",
            ToolName::PdfToChunks => "pdf_to_chunks",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown tool '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for name in ToolName::ALL {
            assert_eq!(name.as_str().parse::<ToolName>().unwrap(), name);
        }
        assert!("rag_search".parse::<ToolName>().is_err());
    }
}
