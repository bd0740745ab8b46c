use itinera_core::plan::TripParameters;
use itinera_core::tools::ToolDescriptor;
use serde_json::json;

/// Fed back as the observation when a reply carries no usable intent.
pub const FORMAT_NUDGE: &str = "Your reply did not contain a valid action. Respond with a Thought line followed by exactly one JSON blob {\"action\": ..., \"action_input\": ...} in a ```json block. Use \"Final Answer\" as the action when you are done.";

pub struct PromptBuilder;

impl PromptBuilder {
    /// ReAct system prompt: the tool list with schemas and the reply format.
    pub fn system_prompt(tools: &[ToolDescriptor]) -> String {
        let mut tool_lines = String::new();
        for tool in tools {
            tool_lines.push_str(&format!(
                "{}: {}, args: {}\n",
                tool.name,
                tool.description.trim(),
                tool.input_schema.properties
            ));
        }
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        format!(
            "Respond to the human as helpfully and accurately as possible. You have access to the following tools:\n\n\
{tool_lines}\n\
Use a json blob to specify a tool by providing an action key (tool name) and an action_input key (tool input).\n\n\
Valid \"action\" values: \"Final Answer\" or {names}\n\n\
Provide only ONE action per json blob, as shown:\n\n\
```json\n{{\n  \"action\": $TOOL_NAME,\n  \"action_input\": $INPUT\n}}\n```\n\n\
Follow this format:\n\n\
Question: input question to answer\n\
Thought: consider previous and subsequent steps\n\
Action:\n```json\n$JSON_BLOB\n```\n\
Observation: action result\n\
... (repeat Thought/Action/Observation N times)\n\
Thought: I know what to respond\n\
Action:\n```json\n{{\n  \"action\": \"Final Answer\",\n  \"action_input\": \"Final response to human\"\n}}\n```\n\n\
Begin! Reminder to ALWAYS respond with a valid json blob of a single action. Use tools if necessary. \
Respond directly if appropriate. Format is Action:```$JSON_BLOB```then Observation",
            tool_lines = tool_lines,
            names = names.join(", "),
        )
    }

    /// The planning task handed to the loop as its first message.
    pub fn task(trip: &TripParameters) -> String {
        let template = serde_json::to_string_pretty(&plan_template()).unwrap_or_default();
        format!(
            "Create a comprehensive travel plan for a trip from {origin} to {destination}.\n\
Travel dates: {start} to {end}\n\
Number of travelers: {travelers}\n\
Budget: {budget}\n\
Interests: {interests}\n\n\
Important instructions:\n\
1. Use ALL available tools to gather complete information.\n\
2. You MUST use only the tools provided by the MCP servers.\n\
3. Return your final answer as a STRICT JSON format with these EXACT sections:\n\
{template}\n\n\
Ensure the JSON is valid and matches the exact structure above. Do NOT use placeholders like \"...\" in the actual JSON.\n",
            origin = trip.origin,
            destination = trip.destination,
            start = trip.start_date,
            end = trip.end_date,
            travelers = trip.traveler_count,
            budget = trip.budget,
            interests = trip.interests_label(),
            template = template,
        )
    }
}

fn plan_template() -> serde_json::Value {
    json!({
        "trip_summary": "A concise overview of the trip",
        "flights": [{"airline": "Airline Name", "flight_number": "ABC123", "departure_time": "2023-06-15T10:00:00", "arrival_time": "2023-06-15T14:30:00", "price": "$500"}],
        "accommodations": [{"name": "Hotel Name", "address": "123 Street, City", "price_per_night": "$200", "rating": "4.5/5"}],
        "weather": {"forecast": "Sunny with occasional clouds", "temperature": "25°C", "precipitation": "10%"},
        "local_events": [{"name": "Local Festival", "time": "2023-06-16T19:00:00", "category": "Cultural", "price": "Free"}],
        "itinerary": [{"day": 1, "date": "2023-06-15", "activities": [{"time": "10:00", "description": "Arrive and check into hotel", "location": "Airport/Hotel"}]}]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_core::plan::SECTION_KEYS;
    use itinera_core::tools::ToolInputSchema;

    fn trip(interests: Vec<String>) -> TripParameters {
        TripParameters {
            origin: "Dallas".into(),
            destination: "Bangalore".into(),
            start_date: "2025-06-15".into(),
            end_date: "2025-06-20".into(),
            traveler_count: 2,
            budget: "Medium (around $3000 total)".into(),
            interests,
        }
    }

    #[test]
    fn test_task_carries_trip_and_every_section() {
        let task = PromptBuilder::task(&trip(vec!["Art".into(), "History".into()]));
        assert!(task.contains("from Dallas to Bangalore"));
        assert!(task.contains("2025-06-15 to 2025-06-20"));
        assert!(task.contains("Number of travelers: 2"));
        assert!(task.contains("Interests: Art, History"));
        for key in SECTION_KEYS {
            assert!(task.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
    }

    #[test]
    fn test_task_defaults_interests() {
        let task = PromptBuilder::task(&trip(vec![]));
        assert!(task.contains("Interests: general tourism"));
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let tools = vec![ToolDescriptor {
            name: "get_weather".into(),
            description: "Forecast for a city".into(),
            input_schema: ToolInputSchema::default(),
        }];
        let prompt = PromptBuilder::system_prompt(&tools);
        assert!(prompt.contains("get_weather: Forecast for a city"));
        assert!(prompt.contains("\"Final Answer\" or get_weather"));
    }
}
