use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

pub async fn index_page() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html")],
        r#"<!DOCTYPE html>
        <html lang="en">
        <head>
            <meta charset="UTF-8">
            <meta name="viewport" content="width=device-width, initial-scale=1.0">
            <title>Puck Tracker</title>
            <style>
                * { margin: 0; padding: 0; box-sizing: border-box; }

                body {
                    background: #fff;
                    color: #000;
                    font-family: monospace;
                    height: 100vh;
                    overflow: hidden;
                }

                .wrapper { height: 100vh; display: flex; flex-direction: column; }

                .header-bar {
                    padding: 15px 20px;
                    border-bottom: 2px solid #000;
                    display: flex;
                    justify-content: space-between;
                    align-items: center;
                }

                .brand { font-weight: 700; font-size: 1.2rem; letter-spacing: -1px; }

                .state { font-size: 0.8rem; }

                .main { flex: 1; display: grid; grid-template-columns: 320px 1fr; }

                .sidebar {
                    border-right: 2px solid #000;
                    overflow-y: auto;
                    padding: 20px;
                }

                .section { margin-bottom: 30px; }

                .section-head {
                    font-size: 0.7rem;
                    font-weight: 700;
                    text-transform: uppercase;
                    letter-spacing: 1px;
                    margin-bottom: 15px;
                    padding-bottom: 8px;
                    border-bottom: 1px solid #000;
                }

                .field-group {
                    display: grid;
                    grid-template-columns: 1fr 1fr;
                    gap: 10px;
                    margin-bottom: 10px;
                }

                .field { display: flex; flex-direction: column; }

                .field-label { font-size: 0.65rem; margin-bottom: 4px; text-transform: uppercase; }

                .field input {
                    border: 1px solid #000;
                    padding: 6px 8px;
                    width: 100%;
                    font-family: monospace;
                }

                .btn {
                    width: 100%;
                    background: #000;
                    color: #fff;
                    border: none;
                    padding: 10px;
                    margin-bottom: 6px;
                    font-family: monospace;
                    font-weight: 700;
                    text-transform: uppercase;
                    cursor: pointer;
                }

                .btn:active { background: #333; }

                .feed { background: #000; display: flex; align-items: center; justify-content: center; }

                .feed img { width: 100%; height: 100%; object-fit: contain; }

                pre { font-size: 0.75rem; white-space: pre-wrap; }
            </style>
        </head>
        <body>
            <div class="wrapper">
                <div class="header-bar">
                    <div class="brand">PUCK TRACKER</div>
                    <div class="state" id="state">-</div>
                </div>

                <div class="main">
                    <div class="sidebar">
                        <div class="section">
                            <div class="section-head">Mode</div>
                            <button class="btn" data-cmd="calibrate">Calibrate</button>
                            <button class="btn" data-cmd="track">Track</button>
                            <button class="btn" data-cmd="find_puck">Find puck</button>
                            <button class="btn" data-cmd="find_fiducials">Find fiducials</button>
                            <button class="btn" data-cmd="clear_error">Clear error</button>
                            <button class="btn" data-cmd="idle">Idle</button>
                        </div>

                        <div class="section">
                            <div class="section-head">Puck HSV</div>
                            <div class="field-group">
                                <div class="field"><div class="field-label">H Low</div><input type="number" id="h_low"></div>
                                <div class="field"><div class="field-label">H High</div><input type="number" id="h_high"></div>
                            </div>
                            <div class="field-group">
                                <div class="field"><div class="field-label">S Low</div><input type="number" id="s_low"></div>
                                <div class="field"><div class="field-label">S High</div><input type="number" id="s_high"></div>
                            </div>
                            <div class="field-group">
                                <div class="field"><div class="field-label">V Low</div><input type="number" id="v_low"></div>
                                <div class="field"><div class="field-label">V High</div><input type="number" id="v_high"></div>
                            </div>
                            <button class="btn" id="save_btn">Apply</button>
                        </div>

                        <div class="section">
                            <div class="section-head">Status</div>
                            <pre id="status">-</pre>
                        </div>
                    </div>

                    <div class="feed">
                        <img src="/stream/tracking" alt="Tracking">
                    </div>
                </div>
            </div>

            <script>
                const val = (id) => Math.max(0, Math.min(255, parseInt(document.getElementById(id).value) || 0));
                const ids = [['h_low', 'h_high'], ['s_low', 's_high'], ['v_low', 'v_high']];

                async function loadRange() {
                    try {
                        const res = await fetch('/config/puck');
                        const range = await res.json();
                        ids.forEach(([lo, hi], i) => {
                            document.getElementById(lo).value = range.lower[i];
                            document.getElementById(hi).value = range.upper[i];
                        });
                    } catch (e) { console.error("Range load error", e); }
                }

                async function applyRange() {
                    const data = {
                        lower: ids.map(([lo]) => val(lo)),
                        upper: ids.map(([, hi]) => val(hi))
                    };
                    await fetch('/config/puck', {
                        method: 'POST',
                        headers: { 'Content-Type': 'application/json' },
                        body: JSON.stringify(data)
                    });
                }

                async function sendCommand(cmd) {
                    await fetch('/command', {
                        method: 'POST',
                        headers: { 'Content-Type': 'application/json' },
                        body: JSON.stringify(cmd)
                    });
                }

                async function pollStatus() {
                    try {
                        const res = await fetch('/status');
                        if (res.ok) {
                            const status = await res.json();
                            document.getElementById('state').textContent =
                                status.state.toUpperCase() + (status.error !== 'none' ? ' / ' + status.error : '');
                            document.getElementById('status').textContent = JSON.stringify(status, null, 2);
                        }
                    } catch (e) { }
                    setTimeout(pollStatus, 250);
                }

                document.querySelectorAll('[data-cmd]').forEach(btn =>
                    btn.addEventListener('click', () => sendCommand(btn.dataset.cmd)));
                document.getElementById('save_btn').addEventListener('click', applyRange);
                loadRange();
                pollStatus();
            </script>
        </body>
        </html>
"#,
    )
}
