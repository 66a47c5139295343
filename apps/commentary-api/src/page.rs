//! Self-refreshing HTML page that polls the display endpoint.

/// Render the display page, polling `{api_url}/display` every five seconds.
///
/// An empty `api_url` makes the page poll its own origin.
pub fn display_page_html(api_url: &str) -> String {
    let api_url = api_url.trim_end_matches('/');
    let api_url = serde_json::to_string(&format!("{api_url}/display"))
        .unwrap_or_else(|_| "\"/display\"".to_owned());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>⚽️ Latest Commentary ⚽️</title>
  <script src="https://cdn.tailwindcss.com"></script>
  <style>
    @keyframes spin-slow {{ to {{ transform: rotate(360deg); }} }}
    .animate-spin-slow {{ display: inline-block; animation: spin-slow 10s linear infinite; }}
  </style>
  <script>
    const apiUrl = {api_url};
    function fetchData() {{
      fetch(apiUrl)
        .then(response => response.json())
        .then(data => {{
          document.getElementById('comment').textContent =
            data.comment || 'No Commentary yet available';
          document.getElementById('timestamp').textContent =
            data.timestamp || 'No Timestamp available';
        }})
        .catch(error => console.error('Error:', error));
    }}
    setInterval(fetchData, 5000);
    fetchData();
  </script>
</head>
<body class="bg-gray-100 min-h-screen flex items-center justify-center">
  <div class="p-8 rounded-lg shadow-md max-w-2xl w-full text-center bg-green-500">
    <h1 class="text-2xl font-bold mb-4 text-gray-800">📣 Latest Commentary 🏟️</h1>
    <div class="bg-gray-50 p-4 rounded border border-gray-200 text-lg">
      <p id="comment">Loading...</p>
      <p id="timestamp" class="mt-2 font-mono text-sm text-gray-500"></p>
    </div>
    <div class="text-2xl animate-spin-slow" aria-label="Data is updating in real-time">⚽️</div>
  </div>
</body>
</html>
"#
    )
}
