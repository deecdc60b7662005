//! Prompts offered to the agent

use super::error::McpError;
use super::protocol::{GetPromptResult, Prompt, PromptMessage, ToolContent};

struct PromptSpec {
    name: &'static str,
    description: &'static str,
    text: &'static str,
}

const SCENE_CREATION_STRATEGY: &str = "\
When working with the scene through these tools, follow these guidelines:

Iterate in small steps and check the scene state between them. Plan for the long term: \
organize objects with layers and metadata (name, description) so the scene stays easy to \
extend. get_objects_with_metadata filters objects by that metadata, and the type and bbox \
fields let you keep new geometry spatially consistent with what is there. Work from coarse \
to fine (first the plot, then the walls, then the windows).

1. Scene context:
   - Start with get_scene_info for a quick overview of units, layers and example objects
   - Use get_objects_with_metadata for detailed information and filtering
   - The short_id in metadata (DDHHMMSS) identifies an object compactly

2. Creating and managing objects:
   - ALWAYS call add_object_metadata after creating an object
   - Give objects meaningful names and keep layers few and purposeful
   - Think about which objects belong together (two panels forming a window)

3. Check the bbox of every item (stored as a list of corner points under \"bbox\"):
   - Objects that should not intersect must not intersect
   - Items keep the right spatial relationship to each other

4. Code execution with execute_code:
   - One statement per line: layer, use, cube, select, delete, print, set result, fail
   - `$last` holds the id of the most recently created cube
   - A failing line stops the script; output printed before it is reported back

5. Best practices:
   - Always show the user the code you are executing
   - Keep objects organized in appropriate layers
   - Use meaningful names and descriptions
";

const PROMPTS: &[PromptSpec] = &[PromptSpec {
    name: "scene_creation_strategy",
    description: "Preferred strategy for creating and managing objects in the scene",
    text: SCENE_CREATION_STRATEGY,
}];

/// Definitions as returned by `prompts/list`
pub fn prompt_definitions() -> Vec<Prompt> {
    PROMPTS
        .iter()
        .map(|p| Prompt {
            name: p.name.into(),
            description: p.description.into(),
            arguments: Vec::new(),
        })
        .collect()
}

/// Render a prompt by name
pub fn get_prompt(name: &str) -> Result<GetPromptResult, McpError> {
    let spec = PROMPTS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| McpError::UnknownPrompt(name.into()))?;

    Ok(GetPromptResult {
        description: spec.description.into(),
        messages: vec![PromptMessage {
            role: "user".into(),
            content: ToolContent::text(spec.text),
        }],
    })
}
