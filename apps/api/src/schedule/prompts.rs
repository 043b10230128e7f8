// Schedule Interpreter prompt templates.
// All prompts for the schedule module are defined here.

/// Interpretation prompt. Replace `{today}`, `{weekday}`, `{current_time}` and
/// `{text}` before sending; see `interpreter::build_prompt`.
pub const SCHEDULE_PARSE_PROMPT: &str = r#"Today's date is: {today} ({weekday})
Current time is: {current_time}

Convert the following natural language schedule description into structured JSON.
When processing relative dates (e.g. "next Tuesday", "tomorrow", "in 2 days"):
- Use the current date above as the reference
- Always convert to specific dates in ISO format (YYYY-MM-DDTHH:MM:SS)
- For recurring events that start from a relative date, use that date as the first occurrence

REQUIREMENTS:
1. ONLY output the JSON object, no additional text, explanations or markdown fences
2. DO NOT include any fields that are not explicitly supported by the input
3. Use EXACTLY the structure and field names shown below
4. Enumerated string fields must use exactly the listed values
5. Do not invent or assume any information not present in the input; never make up a time
6. Put one element in "entries" per activity mentioned; return {"entries": []} if nothing schedulable is mentioned

OUTPUT SCHEMA (return exactly this structure):
{
  "entries": [
    {
      "type": "static" | "dynamic",
      "description": "string, required, the activity name, concise and clear",
      "startingDatetime": "ISO string, optional, only if a specific start is mentioned",
      "endingDatetime": "ISO string, optional, only if a specific end or duration is mentioned",
      "frequency": {
        "perPeriod": "integer >= 1, how many times per period",
        "period": "day" | "week" | "month" | "year" | "never"
      },
      "dependency": {
        "name": "string, the activity this one depends on",
        "type": "before" | "after" | "during" | "not_same_day" | "same_day" | "not_same_week" | "same_week" | "not_same_month" | "same_month"
      }
    }
  ]
}

ENTRY TYPE RULES:
- "static": activities with a specific clock time or date (appointments, meetings at a fixed time),
  and regular recurring events with a fixed pattern and time.
- "dynamic": flexible goals or tasks without a fixed time (exercise 3 times a week),
  and activities with a dependency but NO specific time (meeting after lunch break).

PRECEDENCE RULE (CRITICAL):
If an activity mentions BOTH a specific clock time (like "at 1pm", "at 9am") AND a dependency word
(like "after", "before"), classify it as "static" and DO NOT include the dependency field.
A specific time always takes precedence over a dependency.

FREQUENCY RULES:
- "every weekday" = 5 per week (Monday through Friday)
- "daily" / "every day" = 1 per day
- "weekly" / "every <weekday>" = 1 per week
- "every Monday and Wednesday" = 2 per week
- "twice a week" = 2 per week
- "3 times per week" = 3 per week
- "monthly" = 1 per month
- "every 3 months" / "quarterly" = 4 per year
- a one-time event has no frequency
- for "after work" dependencies, only include them if work hours are mentioned

EXAMPLES (in these examples today is Sunday 2025-06-01):

Input: "gym twice a week starting next monday at 6pm for one hour"
{"entries": [{"type": "static", "description": "Gym", "startingDatetime": "2025-06-02T18:00:00", "endingDatetime": "2025-06-02T19:00:00", "frequency": {"perPeriod": 2, "period": "week"}}]}

Input: "Team meeting every Monday at 2pm and doctor appointment next Tuesday at 10am"
{"entries": [
  {"type": "static", "description": "Team meeting", "startingDatetime": "2025-06-02T14:00:00", "frequency": {"perPeriod": 1, "period": "week"}},
  {"type": "static", "description": "Doctor appointment", "startingDatetime": "2025-06-03T10:00:00"}
]}

Input: "I want to exercise 3 times a week and have a dentist appointment on Friday at 2pm"
{"entries": [
  {"type": "dynamic", "description": "Exercise", "frequency": {"perPeriod": 3, "period": "week"}},
  {"type": "static", "description": "Dentist appointment", "startingDatetime": "2025-06-06T14:00:00"}
]}

Input: "Gym every Monday and Wednesday at 6pm for one hour"
{"entries": [{"type": "static", "description": "Gym", "startingDatetime": "2025-06-02T18:00:00", "endingDatetime": "2025-06-02T19:00:00", "frequency": {"perPeriod": 2, "period": "week"}}]}

Input: "Standup meeting every weekday at 9am for 30 minutes"
{"entries": [{"type": "static", "description": "Standup meeting", "startingDatetime": "2025-06-02T09:00:00", "endingDatetime": "2025-06-02T09:30:00", "frequency": {"perPeriod": 5, "period": "week"}}]}

Input: "Quarterly review meeting every 3 months starting next month"
{"entries": [{"type": "static", "description": "Quarterly review meeting", "startingDatetime": "2025-07-01T00:00:00", "frequency": {"perPeriod": 4, "period": "year"}}]}

Input: "Team sync at 3pm after standup every Tuesday"
{"entries": [{"type": "static", "description": "Team sync", "startingDatetime": "2025-06-03T15:00:00", "frequency": {"perPeriod": 1, "period": "week"}}]}

Input: "Lunch break at 12pm for 1 hour, must be after morning meeting, and gym session 3 times per week"
{"entries": [
  {"type": "static", "description": "Lunch break", "startingDatetime": "2025-06-02T12:00:00", "endingDatetime": "2025-06-02T13:00:00", "frequency": {"perPeriod": 1, "period": "day"}},
  {"type": "dynamic", "description": "Gym session", "frequency": {"perPeriod": 3, "period": "week"}}
]}

Input: "Meeting after lunch break every Tuesday"
{"entries": [{"type": "dynamic", "description": "Meeting", "frequency": {"perPeriod": 1, "period": "week"}, "dependency": {"name": "lunch break", "type": "after"}}]}

Input: "I feel a bit tired today"
{"entries": []}

Now parse this input into the exact same format:
{text}"#;
