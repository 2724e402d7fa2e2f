//! Embedded fallback prompts, compiled into the binary and used when no
//! template file is found on disk (spec §4.3).

pub const RESEARCH_ZONE_OVERVIEW: &str = r#"You are a research agent gathering zone-overview information about
"{{target_entity_name}}" for a game-world lore pipeline.

Use the available search and crawler tools to find the zone's setting,
geography, climate, and general atmosphere. Summarize what you find in
plain prose; cite sources as URIs where possible.
"#;

pub const RESEARCH_NPC: &str = r#"You are a research agent gathering information about notable NPCs
(non-player characters) associated with "{{target_entity_name}}".

Use the available search and crawler tools. For each NPC found, note their
name, role, affiliations, and any distinguishing traits. Cite sources as
URIs where possible.
"#;

pub const RESEARCH_FACTION: &str = r#"You are a research agent gathering information about factions operating
in or around "{{target_entity_name}}".

Use the available search and crawler tools. For each faction, note its
name, goals, allies, and rivals. Cite sources as URIs where possible.
"#;

pub const RESEARCH_LORE: &str = r#"You are a research agent gathering historical and mythological lore
about "{{target_entity_name}}".

Use the available search and crawler tools. Note major historical events,
legends, and their sources. Cite sources as URIs where possible.
"#;

pub const RESEARCH_NARRATIVE_ITEMS: &str = r#"You are a research agent gathering information about narratively
significant items associated with "{{target_entity_name}}".

Use the available search and crawler tools. For each item, note its name,
origin, and narrative significance. Cite sources as URIs where possible.
"#;

pub const EXTRACT_ALL: &str = r#"Extract a structured record from the following research content about
"{{target_entity_name}}".

Respond with a single JSON object matching this schema:
{{schema_hint}}

Research content:
{{content}}
"#;

pub const EXTRACTION_REPAIR: &str = r#"Your previous response did not match the required schema.

Previous response:
{{prior_response}}

Validation error:
{{validation_error}}

Schema:
{{schema_hint}}

Respond again with a single corrected JSON object matching the schema
exactly.
"#;

pub const CROSS_REFERENCE: &str = r#"Review the following extracted categories for "{{target_entity_name}}" and
check internal consistency: for each entity mentioned in one category,
determine whether it is also referenced, where expected, by another
category.

Extracted categories (JSON):
{{extractions_json}}

Respond with a single JSON object of the shape:
{"is_consistent": boolean, "conflicts": [{"category": string, "detail": string}]}
"#;

pub const DISCOVER_CONNECTED_ZONES: &str = r#"Based on the research gathered about "{{target_entity_name}}", identify other
named zones that are directly connected to it (adjacent regions, travel
routes, or explicitly referenced neighboring areas).

Respond with a single JSON object of the shape:
{"zones": [string, ...]}

Only include zones with a clear, specific name. If none are found, respond
with {"zones": []}.
"#;

pub const CHUNK_SUMMARIZE: &str = r#"Summarize the following content in at most {{max_tokens}} tokens.
{{focus_instructions}}

Content:
{{content}}
"#;

pub const MERGE_SUMMARIES: &str = r#"Merge the following chunk summaries into a single coherent summary of at
most {{max_tokens}} tokens, preserving all schema-relevant detail.

Summaries:
{{content}}
"#;

pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "research_zone_overview" => Some(RESEARCH_ZONE_OVERVIEW),
        "research_npc" => Some(RESEARCH_NPC),
        "research_faction" => Some(RESEARCH_FACTION),
        "research_lore" => Some(RESEARCH_LORE),
        "research_narrative_items" => Some(RESEARCH_NARRATIVE_ITEMS),
        "extract_all" => Some(EXTRACT_ALL),
        "extraction_repair" => Some(EXTRACTION_REPAIR),
        "cross_reference" => Some(CROSS_REFERENCE),
        "discover_connected_zones" => Some(DISCOVER_CONNECTED_ZONES),
        "chunk_summarize" => Some(CHUNK_SUMMARIZE),
        "merge_summaries" => Some(MERGE_SUMMARIES),
        _ => None,
    }
}
