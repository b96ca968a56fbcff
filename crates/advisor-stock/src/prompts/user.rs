//! Template sources, one per dimension plus the consolidation prompt
//!
//! Specialist templates take `symbol` and a preformatted `data` block.

pub const PRICE: &str = r"Given the following price data for **{{ symbol }}**, write a concise analysis
(3-5 sentences) covering:
- Whether the current price is near its 52-week high or low
- What the previous close implies about recent momentum
- What is likely driving the price, using the catalysts below when present

Data:
{{ data }}

Respond in plain English. Do NOT give a buy/not-buy verdict yet.";

pub const DIVIDEND: &str = r"Given the following dividend data for **{{ symbol }}**, write a concise analysis
(3-5 sentences) covering:
- Whether the dividend yield is attractive for Philippine investors
- How sustainable the payout appears given the income and cash flow trends
- How it compares to typical PSE dividend stocks
{%- if is_reit %}
- Whether the payout is consistent with the REIT distribution requirement
{%- endif %}

Data:
{{ data }}

Respond in plain English. Do NOT give a buy/not-buy verdict yet.";

pub const MOVEMENT: &str = r"Given the 1-year price movement data for **{{ symbol }}**, write a concise analysis
(3-5 sentences) covering:
- The overall trend direction and magnitude
- Volatility and drawdown concerns
- Any notable monthly or candlestick patterns

Data:
{{ data }}

Respond in plain English. Do NOT give a buy/not-buy verdict yet.";

pub const VALUATION: &str = r"Given the following valuation data for **{{ symbol }}**, write a concise analysis
(3-5 sentences) covering:
- Whether the stock appears undervalued, fairly valued, or overvalued
- How the PE and PB ratios compare to PSE sector averages
- The estimated fair value versus the current price

Ratios marked not meaningful must be described as such, not as zero.

Data:
{{ data }}

Respond in plain English. Do NOT give a buy/not-buy verdict yet.";

pub const CONTROVERSY: &str = r"Given the following anomaly / risk data for **{{ symbol }}**, write a concise analysis
(3-5 sentences) covering:
- Whether any sudden price spikes are a concern
- General risk factors an investor should be aware of
- Anything in the recent headlines that changes the risk picture

Data:
{{ data }}

Respond in plain English. Do NOT give a buy/not-buy verdict yet.";

pub const CONSOLIDATION: &str = r"Below are specialist analyses for **{{ symbol }}**. Synthesise them into a single,
clear investment report written in plain English for a retail investor.
{% for section in sections %}
**{{ section.title }}:**
{% if section.available %}{{ section.body }}{% else %}Data limitation: {{ section.body }}{% endif %}
{% endfor %}
Your report MUST include:
1. A one-paragraph executive summary.
2. Brief sections for each of the five areas above, each starting with its bolded title.
3. A final **Verdict** line that says exactly one of: **BUY** or **NOT BUY**.
4. A one-sentence justification for the verdict.
{%- if missing %}

Some areas could not be analysed ({{ missing | join(', ') }}). Say so in the report and lower
your confidence accordingly.
{%- endif %}";
