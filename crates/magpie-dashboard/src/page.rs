//! Embedded HTML shell for the operator dashboard.

use crate::server::{
    API_AUTH_SESSION_ENDPOINT, API_CUSTOM_ADD_ENDPOINT, API_CUSTOM_LIST_ENDPOINT,
    API_CUSTOM_REMOVE_ENDPOINT, API_LOG_STREAM_ENDPOINT, API_STATUS_ENDPOINT,
};

pub(crate) fn render_dashboard_page() -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Magpie Dashboard</title>
  <style>
    :root {{
      color-scheme: light;
      font-family: "IBM Plex Sans", "Segoe UI", sans-serif;
    }}
    body {{
      margin: 0;
      background: linear-gradient(160deg, #f4f6f8 0%, #eef2f7 100%);
      color: #13232f;
    }}
    .container {{
      max-width: 980px;
      margin: 0 auto;
      padding: 1.5rem;
    }}
    h1 {{
      margin: 0 0 0.5rem 0;
      font-size: 1.5rem;
    }}
    h2 {{
      margin: 0 0 0.5rem 0;
      font-size: 1rem;
    }}
    p {{
      margin: 0.25rem 0 1rem 0;
      color: #3a4f5f;
    }}
    .grid {{
      display: grid;
      gap: 1rem;
      grid-template-columns: 1fr;
    }}
    .panel {{
      background: #ffffff;
      border: 1px solid #d2dde6;
      border-radius: 12px;
      padding: 1rem;
      box-shadow: 0 8px 20px rgba(12, 25, 38, 0.06);
    }}
    label {{
      display: block;
      font-size: 0.85rem;
      margin-bottom: 0.25rem;
      color: #375062;
    }}
    input[type="text"], input[type="password"] {{
      width: 100%;
      box-sizing: border-box;
      border: 1px solid #b8c9d6;
      border-radius: 8px;
      padding: 0.55rem 0.7rem;
      font-size: 0.95rem;
      background: #fbfdff;
      color: #13232f;
    }}
    .row {{
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
      gap: 0.8rem;
      margin-bottom: 0.8rem;
    }}
    .actions {{
      display: flex;
      gap: 0.5rem;
      flex-wrap: wrap;
      margin-top: 0.8rem;
    }}
    button {{
      border: 0;
      border-radius: 8px;
      background: #0f5f7d;
      color: #ffffff;
      padding: 0.55rem 0.9rem;
      font-weight: 600;
      cursor: pointer;
    }}
    button.secondary {{
      background: #3f5f74;
    }}
    button:disabled {{
      cursor: wait;
      opacity: 0.6;
    }}
    pre {{
      margin: 0;
      background: #0f1f2b;
      color: #d9ecf7;
      border-radius: 10px;
      padding: 0.8rem;
      overflow: auto;
      max-height: 300px;
      white-space: pre-wrap;
      word-break: break-word;
      font-size: 0.85rem;
    }}
    @media (min-width: 900px) {{
      .grid {{
        grid-template-columns: 1fr 1fr;
      }}
    }}
  </style>
</head>
<body>
  <main class="container">
    <h1>Magpie Dashboard</h1>
    <p>Operator shell for the Magpie chat bot: status, custom commands, and the live event stream.</p>
    <div class="grid">
      <section class="panel">
        <h2>Access</h2>
        <div class="row">
          <div>
            <label for="authToken">Bearer token</label>
            <input id="authToken" type="text" autocomplete="off" placeholder="token or issued session" />
          </div>
          <div>
            <label for="password">Password (password-session mode)</label>
            <input id="password" type="password" autocomplete="off" />
          </div>
        </div>
        <div class="actions">
          <button id="signIn">Sign in</button>
          <button id="refreshStatus" class="secondary">Refresh status</button>
        </div>
      </section>
      <section class="panel">
        <h2>Bot status</h2>
        <pre id="status">Press "Refresh status" to inspect connector health, event counters, and auth state.</pre>
      </section>
    </div>
    <section class="panel" style="margin-top: 1rem;">
      <h2>Custom commands</h2>
      <div class="row">
        <div>
          <label for="guildId">Guild id</label>
          <input id="guildId" type="text" autocomplete="off" />
        </div>
        <div>
          <label for="commandName">Trigger name</label>
          <input id="commandName" type="text" autocomplete="off" placeholder="greet" />
        </div>
        <div>
          <label for="commandResponse">Response</label>
          <input id="commandResponse" type="text" autocomplete="off" placeholder="hello there" />
        </div>
      </div>
      <div class="actions">
        <button id="loadCommands" class="secondary">Load</button>
        <button id="addCommand">Add</button>
        <button id="removeCommand" class="secondary">Remove</button>
      </div>
      <pre id="commands" style="margin-top: 0.8rem;">No commands loaded.</pre>
    </section>
    <section class="panel" style="margin-top: 1rem;">
      <h2>Live events</h2>
      <div class="actions">
        <button id="connectLogs">Connect</button>
        <button id="clearLogs" class="secondary">Clear</button>
      </div>
      <pre id="logs" style="margin-top: 0.8rem;">Not connected.</pre>
    </section>
  </main>
  <script>
    const STATUS_ENDPOINT = "{status_endpoint}";
    const AUTH_SESSION_ENDPOINT = "{auth_session_endpoint}";
    const CUSTOM_LIST_ENDPOINT = "{custom_list_endpoint}";
    const CUSTOM_ADD_ENDPOINT = "{custom_add_endpoint}";
    const CUSTOM_REMOVE_ENDPOINT = "{custom_remove_endpoint}";
    const LOG_STREAM_ENDPOINT = "{stream_endpoint}";
    const EVENT_KINDS = ["message", "slash", "custom", "error", "info"];
    const STORAGE_TOKEN = "magpie.dashboard.token";
    const STORAGE_GUILD = "magpie.dashboard.guild";
    const tokenInput = document.getElementById("authToken");
    const passwordInput = document.getElementById("password");
    const guildInput = document.getElementById("guildId");
    const nameInput = document.getElementById("commandName");
    const responseInput = document.getElementById("commandResponse");
    const statusPre = document.getElementById("status");
    const commandsPre = document.getElementById("commands");
    const logsPre = document.getElementById("logs");
    let eventSource = null;

    function loadLocalValues() {{
      const storedToken = window.localStorage.getItem(STORAGE_TOKEN);
      const storedGuild = window.localStorage.getItem(STORAGE_GUILD);
      if (storedToken) {{
        tokenInput.value = storedToken;
      }}
      if (storedGuild) {{
        guildInput.value = storedGuild;
      }}
    }}

    function saveLocalValues() {{
      window.localStorage.setItem(STORAGE_TOKEN, tokenInput.value.trim());
      window.localStorage.setItem(STORAGE_GUILD, guildInput.value.trim());
    }}

    function authHeaders() {{
      const token = tokenInput.value.trim();
      if (token.length === 0) {{
        return {{}};
      }}
      return {{
        "Authorization": "Bearer " + token
      }};
    }}

    async function readError(response) {{
      try {{
        const body = await response.json();
        return body.error && body.error.message ? body.error.message : response.statusText;
      }} catch (error) {{
        return response.statusText;
      }}
    }}

    async function signIn() {{
      const password = passwordInput.value;
      const response = await fetch(AUTH_SESSION_ENDPOINT, {{
        method: "POST",
        headers: {{ "Content-Type": "application/json" }},
        body: JSON.stringify({{ password: password }})
      }});
      if (!response.ok) {{
        statusPre.textContent = "sign-in failed: " + await readError(response);
        return;
      }}
      const body = await response.json();
      tokenInput.value = body.access_token;
      saveLocalValues();
      statusPre.textContent = "session issued, expires in " + String(body.expires_in_seconds) + "s";
    }}

    async function refreshStatus() {{
      const response = await fetch(STATUS_ENDPOINT, {{ headers: authHeaders() }});
      if (!response.ok) {{
        statusPre.textContent = "status failed: " + await readError(response);
        return;
      }}
      statusPre.textContent = JSON.stringify(await response.json(), null, 2);
    }}

    async function loadCommands() {{
      saveLocalValues();
      const guildId = guildInput.value.trim();
      if (guildId.length === 0) {{
        commandsPre.textContent = "guild id is required";
        return;
      }}
      const response = await fetch(CUSTOM_LIST_ENDPOINT + "?guild_id=" + encodeURIComponent(guildId), {{
        headers: authHeaders()
      }});
      if (!response.ok) {{
        commandsPre.textContent = "list failed: " + await readError(response);
        return;
      }}
      const body = await response.json();
      if (!body.commands || body.commands.length === 0) {{
        commandsPre.textContent = "no custom commands";
        return;
      }}
      commandsPre.textContent = body.commands
        .map((entry) => "!" + entry.name + " -> " + entry.response)
        .join("\n");
    }}

    async function mutateCommand(endpoint, method, payload) {{
      const response = await fetch(endpoint, {{
        method: method,
        headers: Object.assign({{ "Content-Type": "application/json" }}, authHeaders()),
        body: JSON.stringify(payload)
      }});
      if (!response.ok) {{
        commandsPre.textContent = "request failed: " + await readError(response);
        return;
      }}
      await loadCommands();
    }}

    function connectLogs() {{
      if (eventSource) {{
        eventSource.close();
      }}
      const token = tokenInput.value.trim();
      const url = token.length > 0
        ? LOG_STREAM_ENDPOINT + "?access_token=" + encodeURIComponent(token)
        : LOG_STREAM_ENDPOINT;
      eventSource = new EventSource(url);
      logsPre.textContent = "connecting...";
      for (const kind of EVENT_KINDS) {{
        eventSource.addEventListener(kind, (event) => {{
          appendLog(kind, event.data);
        }});
      }}
      eventSource.onerror = () => {{
        appendLine("[stream error or closed]");
      }};
    }}

    function appendLine(line) {{
      if (logsPre.textContent === "Not connected." || logsPre.textContent === "connecting...") {{
        logsPre.textContent = "";
      }}
      logsPre.textContent += line + "\n";
      logsPre.scrollTop = logsPre.scrollHeight;
    }}

    function appendLog(kind, data) {{
      let payload = null;
      try {{
        payload = JSON.parse(data);
      }} catch (error) {{
        appendLine("[invalid payload] " + data);
        return;
      }}
      const who = payload.userTag || payload.guildName || payload.guildId || "-";
      const text = payload.content || payload.commandName || "";
      appendLine(payload.timestamp + " [" + kind + "] " + who + " " + text);
    }}

    document.getElementById("signIn").addEventListener("click", signIn);
    document.getElementById("refreshStatus").addEventListener("click", refreshStatus);
    document.getElementById("loadCommands").addEventListener("click", loadCommands);
    document.getElementById("addCommand").addEventListener("click", () => {{
      mutateCommand(CUSTOM_ADD_ENDPOINT, "POST", {{
        guild_id: guildInput.value.trim(),
        name: nameInput.value.trim(),
        response: responseInput.value
      }});
    }});
    document.getElementById("removeCommand").addEventListener("click", () => {{
      mutateCommand(CUSTOM_REMOVE_ENDPOINT, "DELETE", {{
        guild_id: guildInput.value.trim(),
        name: nameInput.value.trim()
      }});
    }});
    document.getElementById("connectLogs").addEventListener("click", connectLogs);
    document.getElementById("clearLogs").addEventListener("click", () => {{
      logsPre.textContent = "Not connected.";
    }});
    tokenInput.addEventListener("change", saveLocalValues);
    guildInput.addEventListener("change", saveLocalValues);

    loadLocalValues();
  </script>
</body>
</html>
"#,
        status_endpoint = API_STATUS_ENDPOINT,
        auth_session_endpoint = API_AUTH_SESSION_ENDPOINT,
        custom_list_endpoint = API_CUSTOM_LIST_ENDPOINT,
        custom_add_endpoint = API_CUSTOM_ADD_ENDPOINT,
        custom_remove_endpoint = API_CUSTOM_REMOVE_ENDPOINT,
        stream_endpoint = API_LOG_STREAM_ENDPOINT,
    )
}
